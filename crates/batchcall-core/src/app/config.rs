//! JobConfig - Job の構成
//!
//! 暗黙のカレントディレクトリやグローバル設定は使わず、
//! 作業ディレクトリなどは明示的に Job に渡します
//! （テストごとに成果物を分離できるように）。
//!
//! # デフォルト
//! | 項目 | 値 | 環境変数 |
//! |------|----|----------|
//! | work_dir | `./batchcall-jobs` | `BATCHCALL_WORK_DIR` |
//! | poll_interval | 500ms | `BATCHCALL_POLL_INTERVAL_MS` |
//! | timeout | 10 分（`0` で無制限） | `BATCHCALL_TIMEOUT_SECS` |
//! | worker_program | 現在の実行ファイル | `BATCHCALL_WORKER` |
//! | keep_artifacts | false | `BATCHCALL_KEEP_ARTIFACTS` |

use std::path::PathBuf;
use std::time::Duration;

use super::script::ScriptTemplate;

pub const DEFAULT_WORK_DIR: &str = "batchcall-jobs";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Directory holding payload/script/result/log files.
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    /// Used by `Job::result`; `None` waits forever.
    pub timeout: Option<Duration>,
    pub template: ScriptTemplate,
    /// Program the script runs as `<worker> run --payload P --result R`.
    /// Must resolve function names with the same registry as the caller.
    pub worker_program: PathBuf,
    /// Keep payload/script/result after the outcome has been read.
    pub keep_artifacts: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_TIMEOUT),
            template: ScriptTemplate::default(),
            worker_program: std::env::current_exe()
                .unwrap_or_else(|_| PathBuf::from("batchcall")),
            keep_artifacts: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: String,
    pub value: String,
    pub reason: String,
}

impl JobConfig {
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_template(mut self, template: ScriptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = program.into();
        self
    }

    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Defaults overridden by `BATCHCALL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(dir) = lookup("BATCHCALL_WORK_DIR") {
            cfg.work_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("BATCHCALL_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(parse_u64("BATCHCALL_POLL_INTERVAL_MS", &ms)?);
        }
        if let Some(secs) = lookup("BATCHCALL_TIMEOUT_SECS") {
            cfg.timeout = match parse_u64("BATCHCALL_TIMEOUT_SECS", &secs)? {
                0 => None,
                n => Some(Duration::from_secs(n)),
            };
        }
        if let Some(worker) = lookup("BATCHCALL_WORKER") {
            cfg.worker_program = PathBuf::from(worker);
        }
        if let Some(keep) = lookup("BATCHCALL_KEEP_ARTIFACTS") {
            cfg.keep_artifacts = match keep.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError {
                        var: "BATCHCALL_KEEP_ARTIFACTS".into(),
                        value: keep,
                        reason: "expected true/false".into(),
                    });
                }
            };
        }
        Ok(cfg)
    }
}

fn parse_u64(var: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
