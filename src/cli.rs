use crate::model::{JobState, Query, SearchConfig, SearchEvent, Snapshot};
use crate::orchestrator::{build_record, process_completion, run_controller, UiCommand};
use crate::text_summary::{build_text_summary, history_line, status_line};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "neurasearch",
    version,
    about = "Ask the NeuraSearch service a question and follow the job to its answer"
)]
pub struct Cli {
    /// Query to search for. Without one, queries are read from stdin, one per line
    pub query: Vec<String>,

    /// Base URL of the search service
    #[arg(long, env = "NEURASEARCH_BASE_URL", default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Path of the submit endpoint
    #[arg(long, default_value = "/search")]
    pub submit_path: String,

    /// Path of the status endpoint; {job_id} is replaced by the job identifier
    #[arg(long, default_value = "/status/{job_id}")]
    pub status_path: String,

    /// Pause between status polls
    #[arg(long, default_value = "3s")]
    pub poll_interval: humantime::Duration,

    /// Give up on a job still running after this long (0s waits forever)
    #[arg(long, default_value = "10m")]
    pub poll_timeout: humantime::Duration,

    /// Give up on a job after this many status polls
    #[arg(long)]
    pub max_polls: Option<u32>,

    /// Timeout for each HTTP request
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Print the result as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Export the completed search as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Print the N most recent saved searches and exit
    #[arg(long, value_name = "N")]
    pub history: Option<usize>,

    /// Log HTTP and lifecycle details to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Log filter, e.g. "info" or "neurasearch=debug" (overrides RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
    Silent,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if let Some(limit) = args.history {
        return print_history(&args, limit);
    }

    let mode = if args.silent {
        OutputMode::Silent
    } else if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    if args.query.is_empty() {
        return run_interactive(args, mode).await;
    }
    let query = args.query.join(" ");
    if Query::parse(&query).is_none() {
        return Err(anyhow!("query must not be blank"));
    }
    run_once(args, query, mode).await
}

/// Build a `SearchConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SearchConfig {
    SearchConfig {
        base_url: args.base_url.clone(),
        submit_path: args.submit_path.clone(),
        status_path: args.status_path.clone(),
        poll_interval: Duration::from(args.poll_interval),
        poll_timeout: Some(Duration::from(args.poll_timeout)),
        max_polls: args.max_polls,
        request_timeout: args.request_timeout.map(Duration::from),
        ..SearchConfig::default()
    }
}

fn print_history(args: &Cli, limit: usize) -> Result<()> {
    let records = crate::storage::load_recent(limit).context("failed to load search history")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        eprintln!("No saved searches yet");
    } else {
        for record in &records {
            println!("{}", history_line(record));
        }
    }
    Ok(())
}

/// Timing for the submission currently on screen.
struct Tracker {
    ticket: u64,
    started: Instant,
    polls: u32,
}

/// Renders controller events for one output mode.
struct Presenter<'a> {
    args: &'a Cli,
    cfg: &'a SearchConfig,
    mode: OutputMode,
    interactive: bool,
    out: Option<mpsc::UnboundedSender<OutputLine>>,
    tracker: Option<Tracker>,
    last: Option<Snapshot>,
}

impl Presenter<'_> {
    fn emit(&self, line: OutputLine) {
        if let Some(tx) = self.out.as_ref() {
            let _ = tx.send(line);
        }
    }

    fn progress(&self, msg: String) {
        if self.mode == OutputMode::Text {
            self.emit(OutputLine::Stderr(msg));
        }
    }

    fn on_event(&mut self, ev: SearchEvent) {
        match ev {
            SearchEvent::StateChanged(snapshot) => self.on_state(*snapshot),
            SearchEvent::PollTick {
                ticket,
                job_id,
                attempt,
                status,
            } => {
                if let Some(t) = self.tracker.as_mut().filter(|t| t.ticket == ticket) {
                    t.polls = attempt;
                }
                self.progress(format!("[#{ticket}] Job {job_id}: {status} (poll {attempt})"));
            }
            SearchEvent::Info(info) => self.progress(info.to_message()),
        }
    }

    fn on_state(&mut self, snapshot: Snapshot) {
        match snapshot.state {
            JobState::Submitting => {
                self.tracker = Some(Tracker {
                    ticket: snapshot.ticket,
                    started: Instant::now(),
                    polls: 0,
                });
                self.progress(status_line(&snapshot));
            }
            JobState::Idle | JobState::Polling => self.progress(status_line(&snapshot)),
            JobState::Completed => self.complete(&snapshot),
            // One-shot failures surface as the process error instead.
            JobState::Failed if self.interactive => {
                self.emit(OutputLine::Stderr(status_line(&snapshot)))
            }
            JobState::Failed => {}
        }
        self.last = Some(snapshot);
    }

    fn complete(&mut self, snapshot: &Snapshot) {
        // The terminal answer is itself a poll.
        let (polls, elapsed) = match self.tracker.as_ref().filter(|t| t.ticket == snapshot.ticket) {
            Some(t) => (t.polls + 1, t.started.elapsed()),
            None => (1, Duration::ZERO),
        };
        let Some(record) = build_record(self.cfg, snapshot, polls, elapsed) else {
            return;
        };
        let processed = process_completion(self.args, &record, self.args.auto_save);

        match self.mode {
            OutputMode::Text => {
                for line in build_text_summary(&record).lines {
                    self.emit(OutputLine::Stdout(line));
                }
            }
            OutputMode::Json => {
                // One record per line when reading queries from stdin.
                let out = if self.interactive {
                    serde_json::to_string(&record)
                } else {
                    serde_json::to_string_pretty(&record)
                };
                match out {
                    Ok(s) => self.emit(OutputLine::Stdout(s)),
                    Err(e) => self.emit(OutputLine::Stderr(format!("Encode JSON failed: {e}"))),
                }
            }
            OutputMode::Silent => {}
        }
        for msg in processed.messages {
            self.emit(OutputLine::Stderr(msg));
        }
    }

    /// Last snapshot seen, releasing the output channel.
    fn into_last(self) -> Option<Snapshot> {
        self.last
    }
}

fn output_for(
    mode: OutputMode,
) -> (
    Option<mpsc::UnboundedSender<OutputLine>>,
    Option<tokio::task::JoinHandle<()>>,
) {
    if mode == OutputMode::Silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    }
}

/// Submit one query and follow it to a terminal state.
async fn run_once(args: Cli, query: String, mode: OutputMode) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = output_for(mode);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SearchEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = {
        let cfg = cfg.clone();
        tokio::spawn(async move { run_controller(&cfg, event_tx, cmd_rx).await })
    };
    cmd_tx
        .send(UiCommand::Submit(query))
        .map_err(|_| anyhow!("controller stopped before the query was sent"))?;
    // Closing the command channel lets the controller stop once this job ends.
    drop(cmd_tx);

    let mut presenter = Presenter {
        args: &args,
        cfg: &cfg,
        mode,
        interactive: false,
        out: out_tx,
        tracker: None,
        last: None,
    };
    while let Some(ev) = event_rx.recv().await {
        presenter.on_event(ev);
    }
    let last = presenter.into_last();
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }
    controller.await.context("controller task failed")??;

    match last {
        Some(s) if s.state == JobState::Completed => Ok(()),
        Some(Snapshot {
            error: Some(error), ..
        }) => Err(error.into()),
        Some(s) => Err(anyhow!("search stopped while {}", s.state)),
        None => Err(anyhow!("search never started")),
    }
}

/// Read queries from stdin until end of input; each line supersedes the previous query.
async fn run_interactive(args: Cli, mode: OutputMode) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = output_for(mode);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SearchEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = {
        let cfg = cfg.clone();
        tokio::spawn(async move { run_controller(&cfg, event_tx, cmd_rx).await })
    };

    let mut presenter = Presenter {
        args: &args,
        cfg: &cfg,
        mode,
        interactive: true,
        out: out_tx,
        tracker: None,
        last: None,
    };
    presenter.progress(
        "Type a query and press Enter. Ctrl-D waits for the last search, Ctrl-C quits.".into(),
    );

    let mut cmd_tx = Some(cmd_tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line(), if cmd_tx.is_some() => match line {
                Ok(Some(line)) => {
                    if let Some(tx) = cmd_tx.as_ref() {
                        let _ = tx.send(UiCommand::Submit(line));
                    }
                }
                Ok(None) => cmd_tx = None,
                Err(e) => {
                    tracing::warn!("failed to read stdin: {e}");
                    cmd_tx = None;
                }
            },
            _ = tokio::signal::ctrl_c() => match cmd_tx.take() {
                Some(tx) => {
                    let _ = tx.send(UiCommand::Quit);
                }
                None => controller.abort(),
            },
            ev = event_rx.recv() => match ev {
                Some(ev) => presenter.on_event(ev),
                None => break,
            },
        }
    }

    drop(presenter);
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }
    match controller.await {
        Ok(res) => res,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e).context("controller task failed"),
    }
}
