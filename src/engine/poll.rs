use crate::engine::backend::{BackendClient, PollOutcome};
use crate::engine::{JobReport, PollPolicy, Ticket, WorkerUpdate};
use crate::error::JobError;
use crate::model::JobId;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Parameters for following one accepted job until it reaches a terminal status.
pub(crate) struct PollLoopParams<'a> {
    pub client: &'a BackendClient,
    pub ticket: Ticket,
    pub job_id: &'a JobId,
    pub policy: &'a PollPolicy,
    pub update_tx: &'a mpsc::UnboundedSender<WorkerUpdate>,
}

/// Poll the status endpoint until the job completes or fails.
///
/// The first poll goes out immediately; afterwards the loop sleeps the fixed
/// interval between non-terminal answers. With a timeout, the job is given up
/// only once the deadline has passed and the poll made there was still
/// non-terminal. Returns the terminal report, or `None`
/// when the controller stopped listening.
pub(crate) async fn run_poll_loop(params: PollLoopParams<'_>) -> Option<JobReport> {
    let PollLoopParams {
        client,
        ticket,
        job_id,
        policy,
        update_tx,
    } = params;
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        if update_tx.is_closed() {
            return None;
        }
        attempt += 1;

        match client.status(job_id).await {
            Ok(PollOutcome::Completed(result)) => {
                tracing::debug!(%job_id, attempt, "job completed");
                return Some(JobReport::Completed {
                    job_id: job_id.clone(),
                    result,
                });
            }
            Ok(PollOutcome::Failed(description)) => {
                tracing::debug!(%job_id, attempt, %description, "backend reported failure");
                return Some(JobReport::Failed {
                    job_id: job_id.clone(),
                    error: JobError::BackendJobFailure(description),
                });
            }
            Ok(PollOutcome::Running(status)) => {
                tracing::trace!(%job_id, attempt, %status, "job still running");
                let _ = update_tx.send(WorkerUpdate {
                    ticket,
                    report: JobReport::Progress {
                        job_id: job_id.clone(),
                        attempt,
                        status,
                    },
                });
            }
            Err(error) => {
                tracing::warn!(%job_id, attempt, %error, "status request failed");
                return Some(JobReport::Failed {
                    job_id: job_id.clone(),
                    error,
                });
            }
        }

        let out_of_attempts = policy.max_polls.is_some_and(|max| attempt >= max);
        // The last pause is cut short so one final poll lands on the deadline.
        let mut pause = policy.interval;
        let mut out_of_time = false;
        if let Some(limit) = policy.timeout {
            match limit.checked_sub(start.elapsed()) {
                Some(left) if !left.is_zero() => pause = pause.min(left),
                _ => out_of_time = true,
            }
        }
        if out_of_attempts || out_of_time {
            tracing::warn!(%job_id, attempt, "giving up on job");
            return Some(JobReport::Failed {
                job_id: job_id.clone(),
                error: JobError::PollTimeout {
                    job_id: job_id.clone(),
                    attempts: attempt,
                },
            });
        }

        tokio::time::sleep(pause).await;
    }
}
