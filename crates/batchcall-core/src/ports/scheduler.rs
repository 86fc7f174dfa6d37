//! SchedulerClient port - 外部バッチスケジューラへの薄いアダプタ
//!
//! # 設計原則
//! - キューイング・資源管理はスケジューラに任せる（ここでは実装しない）
//! - 終了判定もスケジューラの一覧に任せる: 一覧に無い job id は
//!   成功・失敗・evict に関係なく「inactive（終端）」とみなす
//! - cancel は best-effort（リモートが outcome を書き終える前に止まる保証はない）
//!
//! # 実装
//! - **SlurmScheduler**: sbatch / squeue / scancel
//! - **LocalScheduler**: bash の子プロセス（開発・テスト用）

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{SchedulerError, SchedulerJobId, SchedulerOptions, SubmissionError};

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Short tag used in log prefixes (`slurm`, `local`).
    fn kind(&self) -> &'static str;

    async fn submit(
        &self,
        script: &Path,
        options: &SchedulerOptions,
    ) -> Result<SchedulerJobId, SubmissionError>;

    /// `false` once the job no longer appears in the scheduler's live listing.
    async fn is_active(&self, job_id: &SchedulerJobId) -> Result<bool, SchedulerError>;

    async fn cancel(&self, job_id: &SchedulerJobId) -> Result<(), SchedulerError>;
}
