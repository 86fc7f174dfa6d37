//! State - ジョブのライフサイクル
//!
//! # 状態遷移
//! ```text
//! Created ──submit──▶ Submitted ──▶ Completed
//!    │                    ├───────▶ Failed
//!    │                    ├───────▶ TimedOut
//!    └──────cancel────────┴───────▶ Cancelled
//! ```
//! - `Created` だけがスケジューラ ID を持たない状態
//! - submit が失敗した場合は `Created` のまま

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Built locally, nothing handed to the scheduler yet.
    Created,

    /// Accepted by the scheduler; may be pending or running remotely.
    Submitted,

    /// The outcome file held a success value.
    Completed,

    /// The outcome file held a failure, or no outcome was written.
    Failed,

    /// `wait` gave up while the scheduler still listed the job.
    TimedOut,

    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::created(JobState::Created, false)]
    #[case::submitted(JobState::Submitted, false)]
    #[case::completed(JobState::Completed, true)]
    #[case::failed(JobState::Failed, true)]
    #[case::timed_out(JobState::TimedOut, true)]
    #[case::cancelled(JobState::Cancelled, true)]
    fn terminal_states(#[case] state: JobState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn state_serializes_as_snake_case() {
        let s = serde_json::to_string(&JobState::TimedOut).unwrap();
        assert_eq!(s, "\"timed_out\"");
    }
}
