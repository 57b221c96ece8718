//! Failure taxonomy for a single query job.
//!
//! Every variant ends the job in the `failed` state; the controller never lets one
//! escape to the presentation layer as anything other than a description.

use crate::model::JobId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Network failure or non-success status on the submit call.
    #[error("failed to submit query: {message}")]
    SubmissionTransport {
        status: Option<u16>,
        message: String,
    },

    /// Submit succeeded at the HTTP level but carried no usable job identifier.
    #[error("submit response was unusable: {0}")]
    SubmissionProtocol(String),

    /// A status request failed or its body could not be understood.
    #[error("failed to poll job {job_id}: {message}")]
    PollTransport { job_id: JobId, message: String },

    /// The backend reported the job as failed.
    #[error("{0}")]
    BackendJobFailure(String),

    #[error("job {job_id} was still running after {attempts} polls")]
    PollTimeout { job_id: JobId, attempts: u32 },
}

impl JobError {
    /// Short machine-friendly name used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::SubmissionTransport { .. } => "submission_transport",
            JobError::SubmissionProtocol(_) => "submission_protocol",
            JobError::PollTransport { .. } => "poll_transport",
            JobError::BackendJobFailure(_) => "backend_job_failure",
            JobError::PollTimeout { .. } => "poll_timeout",
        }
    }

    /// HTTP status of a rejected submit, when the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            JobError::SubmissionTransport { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failure_is_shown_verbatim() {
        let err = JobError::BackendJobFailure("timeout upstream".into());
        assert_eq!(err.to_string(), "timeout upstream");
        assert_eq!(err.kind(), "backend_job_failure");
    }

    #[test]
    fn transport_errors_name_the_step() {
        let err = JobError::SubmissionTransport {
            status: Some(500),
            message: "HTTP 500 Internal Server Error".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to submit query: HTTP 500 Internal Server Error"
        );

        let err = JobError::PollTransport {
            job_id: JobId::new("j-9"),
            message: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "failed to poll job j-9: connection reset");
    }
}
