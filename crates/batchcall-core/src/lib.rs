//! batchcall-core
//!
//! Run a registered async function as a batch job on a cluster scheduler
//! and get its return value (or its error) back in the calling process.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, call, outcome, options, state, errors）
//! - **ports**: 抽象化レイヤー（SchedulerClient, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（Job, ScriptTemplate, runner, config）
//! - **typed**: 型付き関数 API（RemoteFn trait, FunctionRegistry, codec）
//! - **impls**: スケジューラ実装（SLURM, ローカル bash）
//!
//! # 最小の使い方
//! ```no_run
//! # use std::sync::Arc;
//! # use batchcall_core::{CallEnvelope, Job, JobConfig, SchedulerOptions, SlurmScheduler};
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let call = CallEnvelope::builder("add").arg(&1).arg(&2).build()?;
//! let options = SchedulerOptions::new().partition("short").time("00:05:00");
//! let mut job = Job::new(call, options, JobConfig::from_env()?, Arc::new(SlurmScheduler::default()));
//! job.submit().await?;
//! let sum: i64 = job.result_as().await?;
//! # let _ = sum;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Job, JobConfig, JobPoll, ScriptTemplate};
pub use domain::{CallEnvelope, JobError, JobState, OutcomeEnvelope, SchedulerJobId, SchedulerOptions};
pub use impls::{LocalScheduler, SlurmScheduler};
pub use ports::SchedulerClient;
pub use typed::{CallArgs, FunctionRegistry, RemoteError, RemoteFn};
