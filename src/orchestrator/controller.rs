//! Query Job Controller.
//!
//! Owns the query lifecycle and emits events for presentation layers. Commands
//! from the UI and reports from job tasks are funnelled through this one task,
//! which is the only writer of lifecycle state.

use crate::engine::{JobEngine, JobReport, Ticket, WorkerUpdate};
use crate::error::JobError;
use crate::model::{InfoEvent, SearchConfig, SearchEvent};
use crate::orchestrator::lifecycle::Lifecycle;
use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Commands emitted by presentation layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start a new query, superseding the current one. Blank input is ignored.
    Submit(String),
    /// Stop immediately, abandoning any job in flight.
    Quit,
}

/// Internal handle for a running job task.
struct JobCtx {
    ticket: Ticket,
    handle: tokio::task::JoinHandle<()>,
}

fn emit_state(event_tx: &UnboundedSender<SearchEvent>, lifecycle: &Lifecycle) {
    let _ = event_tx.send(SearchEvent::StateChanged(Box::new(lifecycle.snapshot())));
}

/// Feed one worker report through the lifecycle. Returns `true` once the current job is terminal.
fn handle_update(
    lifecycle: &mut Lifecycle,
    event_tx: &UnboundedSender<SearchEvent>,
    update: WorkerUpdate,
) -> bool {
    let ticket = update.ticket;
    if !lifecycle.is_current(&update) {
        tracing::debug!(ticket, "dropping stale report");
        let _ = event_tx.send(SearchEvent::Info(InfoEvent::StaleIgnored { ticket }));
        return false;
    }

    if let JobReport::Progress {
        job_id,
        attempt,
        status,
    } = &update.report
    {
        let _ = event_tx.send(SearchEvent::PollTick {
            ticket,
            job_id: job_id.clone(),
            attempt: *attempt,
            status: status.clone(),
        });
    }

    if !lifecycle.apply(update) {
        return false;
    }
    emit_state(event_tx, lifecycle);

    let state = lifecycle.state();
    if state.is_terminal() {
        let snapshot = lifecycle.snapshot();
        match snapshot.error.as_ref() {
            Some(error) => tracing::warn!(ticket, kind = error.kind(), %error, "query failed"),
            None => tracing::info!(ticket, "query completed"),
        }
        return true;
    }
    tracing::debug!(ticket, %state, "query advanced");
    false
}

/// Terminal report for a job whose task ended without producing one.
fn abandoned(ticket: Ticket, lifecycle: &Lifecycle) -> WorkerUpdate {
    let message = "job task stopped before the job finished".to_string();
    let report = match lifecycle.snapshot().job_id {
        Some(job_id) => JobReport::Failed {
            error: JobError::PollTransport {
                job_id: job_id.clone(),
                message,
            },
            job_id,
        },
        None => JobReport::SubmitFailed(JobError::SubmissionTransport {
            status: None,
            message,
        }),
    };
    WorkerUpdate { ticket, report }
}

/// Drive queries from `cmd_rx` to completion and report every transition on `event_tx`.
///
/// Returns after `UiCommand::Quit`, or once all command senders are gone and the
/// current job (if any) has finished.
pub(crate) async fn run_controller(
    cfg: &SearchConfig,
    event_tx: UnboundedSender<SearchEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let engine = JobEngine::new(cfg)?;
    let mut lifecycle = Lifecycle::new();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<WorkerUpdate>();
    let mut job_ctx: Option<JobCtx> = None;
    // Set once the command channel closes: finish the current job, then stop.
    let mut draining = false;

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !draining => {
                match cmd {
                    Some(UiCommand::Submit(raw)) => {
                        let Some((ticket, query)) = lifecycle.begin(&raw) else {
                            tracing::debug!("ignoring blank query");
                            continue;
                        };
                        if let Some(old) = job_ctx.take() {
                            // Late reports from the old job are dropped by ticket; aborting
                            // additionally stops it from polling the backend.
                            old.handle.abort();
                            let _ = event_tx.send(SearchEvent::Info(InfoEvent::Superseded {
                                ticket: old.ticket,
                            }));
                        }
                        tracing::info!(ticket, %query, "submitting query");
                        emit_state(&event_tx, &lifecycle);
                        let handle = tokio::spawn(engine.clone().run(ticket, query, update_tx.clone()));
                        job_ctx = Some(JobCtx { ticket, handle });
                    }
                    Some(UiCommand::Quit) => {
                        if let Some(ctx) = job_ctx.take() {
                            ctx.handle.abort();
                        }
                        break Ok(());
                    }
                    None => {
                        if job_ctx.is_none() || lifecycle.state().is_terminal() {
                            break Ok(());
                        }
                        draining = true;
                    }
                }
            }
            Some(update) = update_rx.recv() => {
                let current = job_ctx.as_ref().map(|ctx| ctx.ticket) == Some(update.ticket);
                if handle_update(&mut lifecycle, &event_tx, update) && current {
                    job_ctx = None;
                    if draining {
                        break Ok(());
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut job_ctx {
                    return Some((ctx.ticket, (&mut ctx.handle).await));
                }
                futures::future::pending().await
            } => {
                job_ctx = None;
                // The task may have exited right after queueing its final report.
                while let Ok(update) = update_rx.try_recv() {
                    handle_update(&mut lifecycle, &event_tx, update);
                }
                if let Some((ticket, joined)) = maybe_done {
                    if let Err(e) = &joined {
                        if !e.is_cancelled() {
                            tracing::error!(ticket, error = %e, "job task failed");
                        }
                    }
                    if lifecycle.current_ticket() == Some(ticket) && !lifecycle.state().is_terminal() {
                        let update = abandoned(ticket, &lifecycle);
                        handle_update(&mut lifecycle, &event_tx, update);
                    }
                }
                if draining {
                    break Ok(());
                }
            }
        }
    };

    res
}
