//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SlurmScheduler**: 本番用（sbatch / squeue / scancel）
//! - **LocalScheduler**: 開発・テスト用（bash の子プロセス）

pub mod local;
pub mod slurm;

pub use self::local::LocalScheduler;
pub use self::slurm::SlurmScheduler;
