//! Job - 1 回の関数呼び出しをバッチジョブとして管理するオーケストレーター
//!
//! # 状態遷移
//! - `submit()`: Created → Submitted（失敗したら Created のまま、ファイルも残さない）
//! - `poll()`: is_active を 1 回だけ問い合わせる非ブロッキング版
//! - `wait(timeout)`: poll + sleep のループ。timeout は `wait` 呼び出し時点から計測
//! - `result()`: `wait(config.timeout)`。終端状態に入った後は何度呼んでも同じ結果
//!   （スケジューラには問い合わせない）
//! - `cancel()`: best-effort
//!
//! # 不変条件
//! - result ファイルはスケジューラが inactive と報告した後にしか読まない
//! - inactive なのに result ファイルが無い/読めない場合は `Crashed`（成功扱いしない）
//! - 未 submit の Job に対する `poll`/`wait`/`result` は `NotSubmitted`
//!   （自動 submit はしない。submit + result をまとめたい場合は `run()`）

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::config::JobConfig;
use super::layout::JobPaths;
use super::script::ScriptContext;
use super::status::JobStatusView;
use crate::domain::{
    CallEnvelope, JobError, JobFailure, JobKey, JobState, OutcomeEnvelope, SchedulerJobId,
    SchedulerOptions,
};
use crate::ports::{IdGenerator, SchedulerClient, SystemClock, UlidGenerator};
use crate::typed::codec;

/// Result of a single non-blocking [`Job::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// The scheduler still lists the job.
    Pending,
    Ready(serde_json::Value),
}

/// Cached terminal result, replayed by every later poll/wait/result.
#[derive(Debug, Clone)]
enum Finish {
    Completed(serde_json::Value),
    Failed(JobFailure),
    Crashed {
        job_id: SchedulerJobId,
        reason: String,
    },
    TimedOut {
        job_id: SchedulerJobId,
        timeout: Duration,
    },
    Cancelled,
}

impl Finish {
    fn state(&self) -> JobState {
        match self {
            Self::Completed(_) => JobState::Completed,
            Self::Failed(_) | Self::Crashed { .. } => JobState::Failed,
            Self::TimedOut { .. } => JobState::TimedOut,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    fn replay(&self) -> Result<serde_json::Value, JobError> {
        match self {
            Self::Completed(value) => Ok(value.clone()),
            Self::Failed(failure) => Err(JobError::Failed(failure.clone())),
            Self::Crashed { job_id, reason } => Err(JobError::Crashed {
                job_id: job_id.clone(),
                reason: reason.clone(),
            }),
            Self::TimedOut { job_id, timeout } => Err(JobError::Timeout {
                job_id: job_id.clone(),
                timeout: *timeout,
            }),
            Self::Cancelled => Err(JobError::Cancelled),
        }
    }
}

pub struct Job {
    key: JobKey,
    call: CallEnvelope,
    options: SchedulerOptions,
    config: JobConfig,
    paths: JobPaths,
    scheduler: Arc<dyn SchedulerClient>,
    state: JobState,
    scheduler_id: Option<SchedulerJobId>,
    finish: Option<Finish>,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        call: CallEnvelope,
        options: SchedulerOptions,
        config: JobConfig,
        scheduler: Arc<dyn SchedulerClient>,
    ) -> Self {
        Self::with_id_generator(
            call,
            options,
            config,
            scheduler,
            &UlidGenerator::new(SystemClock),
        )
    }

    pub fn with_id_generator(
        call: CallEnvelope,
        options: SchedulerOptions,
        config: JobConfig,
        scheduler: Arc<dyn SchedulerClient>,
        ids: &dyn IdGenerator,
    ) -> Self {
        let key = ids.generate_job_key();
        let paths = JobPaths::new(&config.work_dir, call.function().as_str(), &key);
        Self {
            key,
            call,
            options,
            config,
            paths,
            scheduler,
            state: JobState::Created,
            scheduler_id: None,
            finish: None,
            created_at: Utc::now(),
            submitted_at: None,
            finished_at: None,
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// `None` until the scheduler accepted the job.
    pub fn scheduler_id(&self) -> Option<&SchedulerJobId> {
        self.scheduler_id.as_ref()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn function(&self) -> &str {
        self.call.function().as_str()
    }

    pub fn call(&self) -> &CallEnvelope {
        &self.call
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn status(&self) -> JobStatusView {
        JobStatusView {
            key: self.key,
            scheduler_id: self.scheduler_id.clone(),
            function: self.function().to_string(),
            state: self.state,
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            finished_at: self.finished_at,
            paths: self.paths.clone(),
        }
    }

    /// Write payload and script, then hand the script to the scheduler.
    pub async fn submit(&mut self) -> Result<SchedulerJobId, JobError> {
        if self.state != JobState::Created {
            return Err(JobError::InvalidState(self.state));
        }

        match self.try_submit().await {
            Ok(job_id) => {
                info!(
                    job = %self.key,
                    scheduler_id = %job_id,
                    function = %self.function(),
                    scheduler = self.scheduler.kind(),
                    "job submitted"
                );
                self.scheduler_id = Some(job_id.clone());
                self.state = JobState::Submitted;
                self.submitted_at = Some(Utc::now());
                Ok(job_id)
            }
            Err(err) => {
                warn!(job = %self.key, function = %self.function(), error = %err, "submission failed");
                // A later retry must not pick up this attempt's files.
                remove_quietly(&self.paths.payload).await;
                remove_quietly(&self.paths.script).await;
                Err(err)
            }
        }
    }

    async fn try_submit(&self) -> Result<SchedulerJobId, JobError> {
        let work_dir = &self.config.work_dir;
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| JobError::io(work_dir, e))?;

        let payload = self.call.encode()?;
        write_file(&self.paths.payload, &payload).await?;

        let script = self.config.template.render(&ScriptContext {
            worker: &self.config.worker_program,
            payload_path: &self.paths.payload,
            result_path: &self.paths.result,
            log_path: &self.paths.log,
            function: self.function(),
            scheduler_kind: self.scheduler.kind(),
            options: &self.options,
        });
        write_file(&self.paths.script, script.as_bytes()).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.paths.script, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| JobError::io(&self.paths.script, e))?;
        }

        match tokio::fs::remove_file(&self.paths.result).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(JobError::io(&self.paths.result, e)),
        }

        Ok(self
            .scheduler
            .submit(&self.paths.script, &self.options)
            .await?)
    }

    /// One status query; reads the outcome once the job is inactive.
    pub async fn poll(&mut self) -> Result<JobPoll, JobError> {
        self.poll_before(None).await
    }

    /// A status query that has not answered by `deadline` counts as
    /// `Pending`.
    async fn poll_before(&mut self, deadline: Option<Instant>) -> Result<JobPoll, JobError> {
        if let Some(finish) = &self.finish {
            return finish.replay().map(JobPoll::Ready);
        }
        let Some(job_id) = self.scheduler_id.clone() else {
            return Err(JobError::NotSubmitted);
        };

        let query = self.scheduler.is_active(&job_id);
        let active = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, query).await {
                Ok(active) => active?,
                Err(_) => {
                    warn!(job = %self.key, scheduler_id = %job_id, "status query outlived the deadline");
                    return Ok(JobPoll::Pending);
                }
            },
            None => query.await?,
        };
        if active {
            trace!(job = %self.key, scheduler_id = %job_id, "still active");
            return Ok(JobPoll::Pending);
        }

        let finish = self.read_outcome(job_id).await;
        self.settle(finish).await.replay().map(JobPoll::Ready)
    }

    /// Poll until the job leaves the scheduler or `timeout` (measured from
    /// this call) elapses. `None` waits forever.
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<serde_json::Value, JobError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let JobPoll::Ready(value) = self.poll_before(deadline).await? {
                return Ok(value);
            }
            let nap = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return self.time_out(timeout.unwrap_or_default()).await;
                    }
                    self.config.poll_interval.min(deadline - now)
                }
                None => self.config.poll_interval,
            };
            tokio::time::sleep(nap).await;
        }
    }

    /// `wait` with the configured timeout.
    pub async fn result(&mut self) -> Result<serde_json::Value, JobError> {
        self.wait(self.config.timeout).await
    }

    pub async fn result_as<T: DeserializeOwned>(&mut self) -> Result<T, JobError> {
        let value = self.result().await?;
        let what = format!("result of {:?}", self.function());
        Ok(codec::from_value(value, &what)?)
    }

    /// Submit (if not yet submitted) and wait for the result.
    pub async fn run(&mut self) -> Result<serde_json::Value, JobError> {
        if self.state == JobState::Created {
            self.submit().await?;
        }
        self.result().await
    }

    pub async fn cancel(&mut self) -> Result<(), JobError> {
        match self.state {
            JobState::Created => {
                self.settle(Finish::Cancelled).await;
                Ok(())
            }
            JobState::Submitted => {
                if let Some(job_id) = &self.scheduler_id {
                    self.scheduler.cancel(job_id).await?;
                    info!(job = %self.key, scheduler_id = %job_id, "job cancelled");
                }
                self.settle(Finish::Cancelled).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Remove payload, script and result; the log is kept.
    pub async fn cleanup(&self) -> Result<(), JobError> {
        for path in self.paths.transient() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(JobError::io(path, e)),
            }
        }
        Ok(())
    }

    /// Prefixed remote output captured so far.
    pub async fn read_log(&self) -> Result<String, JobError> {
        tokio::fs::read_to_string(&self.paths.log)
            .await
            .map_err(|e| JobError::io(&self.paths.log, e))
    }

    async fn read_outcome(&self, job_id: SchedulerJobId) -> Finish {
        let path = &self.paths.result;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Finish::Crashed {
                    job_id,
                    reason: format!("no outcome file at {}", path.display()),
                };
            }
            Err(e) => {
                return Finish::Crashed {
                    job_id,
                    reason: format!("cannot read outcome file {}: {e}", path.display()),
                };
            }
        };

        match OutcomeEnvelope::decode(&bytes) {
            Ok(OutcomeEnvelope::Success { value }) => Finish::Completed(value),
            Ok(OutcomeEnvelope::Failure {
                error_type,
                message,
                trace,
            }) => Finish::Failed(JobFailure {
                function: self.function().to_string(),
                scheduler_id: job_id,
                error_type,
                message,
                trace,
            }),
            Err(e) => Finish::Crashed {
                job_id,
                reason: e.to_string(),
            },
        }
    }

    async fn time_out(&mut self, timeout: Duration) -> Result<serde_json::Value, JobError> {
        let job_id = self.scheduler_id.clone().ok_or(JobError::NotSubmitted)?;
        warn!(job = %self.key, scheduler_id = %job_id, ?timeout, "timed out, cancelling");
        if let Err(e) = self.scheduler.cancel(&job_id).await {
            warn!(job = %self.key, scheduler_id = %job_id, error = %e, "cancel after timeout failed");
        }
        self.settle(Finish::TimedOut { job_id, timeout }).await.replay()
    }

    /// Record a terminal result; later calls replay it.
    async fn settle(&mut self, finish: Finish) -> &Finish {
        self.state = finish.state();
        self.finished_at = Some(Utc::now());

        match &finish {
            Finish::Completed(_) => {
                info!(job = %self.key, function = %self.function(), "job completed");
            }
            Finish::Failed(failure) => {
                warn!(
                    job = %self.key,
                    error_type = %failure.error_type,
                    message = %failure.message,
                    "job failed"
                );
            }
            Finish::Crashed { reason, .. } => {
                warn!(job = %self.key, %reason, "job ended without an outcome");
            }
            Finish::TimedOut { .. } | Finish::Cancelled => {}
        }

        // Crashed jobs keep their payload and script for inspection; timed-out
        // jobs may still be writing.
        if matches!(finish, Finish::Completed(_) | Finish::Failed(_)) && !self.config.keep_artifacts {
            if let Err(e) = self.cleanup().await {
                debug!(job = %self.key, error = %e, "cleanup failed");
            }
        }

        self.finish.insert(finish)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), JobError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| JobError::io(path, e))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %e, "could not remove artifact");
        }
    }
}
