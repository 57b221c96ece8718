//! Query lifecycle state machine.
//!
//! `idle -> submitting -> {failed | polling} -> {completed | failed}`. Pure and
//! synchronous: the controller task owns the only instance and feeds it every
//! command and worker report, so all state mutation happens in one place.

use crate::engine::{JobReport, Ticket, WorkerUpdate};
use crate::error::JobError;
use crate::model::{JobId, JobState, Query, SearchResult, Snapshot};

#[derive(Debug)]
struct ActiveJob {
    ticket: Ticket,
    query: Query,
    job_id: Option<JobId>,
    state: JobState,
    result: Option<SearchResult>,
    error: Option<JobError>,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    last_ticket: Ticket,
    current: Option<ActiveJob>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.current
            .as_ref()
            .map(|job| job.state)
            .unwrap_or(JobState::Idle)
    }

    pub fn current_ticket(&self) -> Option<Ticket> {
        self.current.as_ref().map(|job| job.ticket)
    }

    /// Start a new query, discarding whatever job came before it.
    ///
    /// Returns `None` (and changes nothing) when the query is blank.
    pub fn begin(&mut self, raw: &str) -> Option<(Ticket, Query)> {
        let query = Query::parse(raw)?;
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        self.current = Some(ActiveJob {
            ticket,
            query: query.clone(),
            job_id: None,
            state: JobState::Submitting,
            result: None,
            error: None,
        });
        Some((ticket, query))
    }

    /// Apply a worker report. Returns `true` when it changed the observable state.
    ///
    /// Reports for any ticket other than the current one are stale and dropped.
    /// Poll reports must also carry the current job id. Progress never moves the
    /// state, and nothing moves a job out of a terminal state.
    pub fn apply(&mut self, update: WorkerUpdate) -> bool {
        let Some(job) = self.current.as_mut() else {
            return false;
        };
        if update.ticket != job.ticket {
            return false;
        }

        match (job.state, update.report) {
            (JobState::Submitting, JobReport::Submitted { job_id }) => {
                job.job_id = Some(job_id);
                job.state = JobState::Polling;
                true
            }
            (JobState::Submitting, JobReport::SubmitFailed(error)) => {
                job.error = Some(error);
                job.state = JobState::Failed;
                true
            }
            (JobState::Polling, JobReport::Completed { job_id, result })
                if job.job_id.as_ref() == Some(&job_id) =>
            {
                job.result = Some(result);
                job.state = JobState::Completed;
                true
            }
            (JobState::Polling, JobReport::Failed { job_id, error })
                if job.job_id.as_ref() == Some(&job_id) =>
            {
                job.error = Some(error);
                job.state = JobState::Failed;
                true
            }
            _ => false,
        }
    }

    /// Whether `update` belongs to the job currently being tracked.
    pub fn is_current(&self, update: &WorkerUpdate) -> bool {
        let Some(job) = self.current.as_ref() else {
            return false;
        };
        if update.ticket != job.ticket {
            return false;
        }
        match &update.report {
            JobReport::Submitted { .. } | JobReport::SubmitFailed(_) => true,
            JobReport::Progress { job_id, .. }
            | JobReport::Completed { job_id, .. }
            | JobReport::Failed { job_id, .. } => job.job_id.as_ref() == Some(job_id),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        match &self.current {
            None => Snapshot::default(),
            Some(job) => Snapshot {
                ticket: job.ticket,
                state: job.state,
                query: Some(job.query.as_str().to_string()),
                job_id: job.job_id.clone(),
                result: job.result.clone(),
                error: job.error.clone(),
            },
        }
    }
}
