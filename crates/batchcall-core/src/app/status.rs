//! Status - Job の状態スナップショット
//!
//! CLI やログ出力向けのシリアライズ可能なビューです。

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::layout::JobPaths;
use crate::domain::{JobKey, JobState, SchedulerJobId};

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub key: JobKey,
    pub scheduler_id: Option<SchedulerJobId>,
    pub function: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub paths: JobPaths,
}

impl JobStatusView {
    /// Wall-clock time from submission to termination, if both happened.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.submitted_at?)
    }
}
