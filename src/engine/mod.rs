mod backend;
mod poll;

use backend::BackendClient;
use crate::error::JobError;
use crate::model::{JobId, Query, SearchConfig, SearchResult};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Local sequence number of one submission. Stays valid before the backend has assigned a job id.
pub type Ticket = u64;

/// What a job task reports back to the controller.
#[derive(Debug, Clone)]
pub enum JobReport {
    Submitted { job_id: JobId },
    SubmitFailed(JobError),
    /// A non-terminal status answer.
    Progress {
        job_id: JobId,
        attempt: u32,
        status: String,
    },
    Completed {
        job_id: JobId,
        result: SearchResult,
    },
    Failed {
        job_id: JobId,
        error: JobError,
    },
}

/// A report tagged with the submission it belongs to.
#[derive(Debug, Clone)]
pub struct WorkerUpdate {
    pub ticket: Ticket,
    pub report: JobReport,
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Overall deadline for the poll loop; `None` polls forever.
    pub timeout: Option<Duration>,
    pub max_polls: Option<u32>,
}

impl PollPolicy {
    pub fn from_config(cfg: &SearchConfig) -> Self {
        Self {
            interval: cfg.poll_interval,
            timeout: cfg.poll_timeout.filter(|d| !d.is_zero()),
            max_polls: cfg.max_polls.filter(|n| *n > 0),
        }
    }
}

/// Runs submissions against the backend. Cheap to clone; every job shares one HTTP client.
#[derive(Clone)]
pub struct JobEngine {
    client: Arc<BackendClient>,
    policy: PollPolicy,
}

impl JobEngine {
    pub fn new(cfg: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(BackendClient::new(cfg)?),
            policy: PollPolicy::from_config(cfg),
        })
    }

    /// Submit `query`, then follow the job to a terminal status.
    ///
    /// Every outcome goes to `update_tx` tagged with `ticket`; this task never
    /// touches controller state.
    pub async fn run(
        self,
        ticket: Ticket,
        query: Query,
        update_tx: mpsc::UnboundedSender<WorkerUpdate>,
    ) {
        let send = |report: JobReport| update_tx.send(WorkerUpdate { ticket, report }).is_ok();

        let job_id = match self.client.submit(&query).await {
            Ok(job_id) => job_id,
            Err(error) => {
                tracing::warn!(ticket, status = ?error.http_status(), %error, "submission failed");
                send(JobReport::SubmitFailed(error));
                return;
            }
        };
        if !send(JobReport::Submitted {
            job_id: job_id.clone(),
        }) {
            return;
        }

        let terminal = poll::run_poll_loop(poll::PollLoopParams {
            client: &self.client,
            ticket,
            job_id: &job_id,
            policy: &self.policy,
            update_tx: &update_tx,
        })
        .await;

        if let Some(report) = terminal {
            send(report);
        }
    }
}
