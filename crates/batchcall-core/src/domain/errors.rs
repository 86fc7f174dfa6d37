//! Errors - エラー型と分類
//!
//! # 分類
//! - `SerializationError`: 引数・戻り値が encode/decode できない（リトライ無意味）
//! - `SubmissionError`: スケジューラが submit を拒否した、または起動できなかった
//! - `SchedulerError`: status 問い合わせ / cancel の失敗
//! - `JobError`: `Job` の操作（wait/result など）が返すエラーの全体
//!
//! どのエラーも握りつぶさず、`wait`/`result` から同期的に伝播させます。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::ids::SchedulerJobId;
use super::state::JobState;

/// A value could not be encoded or decoded.
///
/// `what` names the offending value (`argument #1`, `keyword argument "scale"`,
/// `outcome file`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot serialize {what}: {reason}")]
pub struct SerializationError {
    pub what: String,
    pub reason: String,
}

impl SerializationError {
    pub fn new(what: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// The external scheduler rejected the job or could not be invoked.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Rejected {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("could not find a job id in submission output {0:?}")]
    UnparsableOutput(String),
}

/// A status query or cancellation request failed.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("status query failed: {0}")]
    Query(String),

    #[error("cancel of job {job_id} failed: {reason}")]
    Cancel {
        job_id: SchedulerJobId,
        reason: String,
    },
}

/// The remote invocation returned an error (or panicked).
///
/// The caller cannot rebuild the original error type, so the original type
/// name, message and trace travel as plain fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {function} (id {scheduler_id}) failed with {error_type}: {message}")]
pub struct JobFailure {
    pub function: String,
    pub scheduler_id: SchedulerJobId,
    pub error_type: String,
    pub message: String,
    pub trace: String,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("job {job_id} still active after {timeout:?}")]
    Timeout {
        job_id: SchedulerJobId,
        timeout: Duration,
    },

    /// The job left the scheduler without a readable outcome
    /// (killed, out of memory, script error before the outcome write, ...).
    #[error("job {job_id} terminated without an outcome: {reason}")]
    Crashed {
        job_id: SchedulerJobId,
        reason: String,
    },

    #[error(transparent)]
    Failed(#[from] JobFailure),

    #[error("job has not been submitted")]
    NotSubmitted,

    #[error("operation not allowed in state {0:?}")]
    InvalidState(JobState),

    #[error("job was cancelled")]
    Cancelled,

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failure_message_carries_original_type_and_message() {
        let failure = JobFailure {
            function: "fail".to_string(),
            scheduler_id: SchedulerJobId::new("17"),
            error_type: "ValueError".to_string(),
            message: "This job will fail".to_string(),
            trace: String::new(),
        };
        let err = JobError::from(failure);
        let msg = err.to_string();
        assert!(msg.contains("ValueError"));
        assert!(msg.contains("This job will fail"));
        assert!(msg.contains("17"));
    }

    #[test]
    fn serialization_error_names_the_value() {
        let err = SerializationError::new("argument #1", "key must be a string");
        assert_eq!(
            err.to_string(),
            "cannot serialize argument #1: key must be a string"
        );
    }
}
