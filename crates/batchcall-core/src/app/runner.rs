//! Runner - リモート側の実行（スクリプトから呼ばれる）
//!
//! # フロー
//! 1. payload ファイルを読み、CallEnvelope を decode
//! 2. registry から関数を名前で引く
//! 3. tokio task として実行（panic も JoinError で捕まえる）
//! 4. OutcomeEnvelope を result ファイルへ書く（tmp → fsync → rename → 0400）
//! 5. 終了ステータスを返す
//!
//! 呼び出し側が成功・失敗を判断するのは outcome ファイルだけです。
//! 終了コードはスケジューラの会計のための補助情報にすぎません。

use std::any::Any;
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::domain::{CallEnvelope, OutcomeEnvelope, SerializationError};
use crate::typed::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// A failure outcome was written.
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Failed => 1,
        }
    }
}

/// No outcome could be written; the caller will see a crashed job.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("cannot write outcome to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Decode `payload`, invoke the function, write the outcome to `result`.
pub async fn run_payload(
    registry: &FunctionRegistry,
    payload: &Path,
    result: &Path,
) -> Result<RunStatus, RunnerError> {
    let outcome = execute(registry, payload).await;
    let status = if outcome.is_success() {
        RunStatus::Succeeded
    } else {
        RunStatus::Failed
    };
    write_outcome(result, &outcome).await?;
    info!(result = %result.display(), ?status, "outcome written");
    Ok(status)
}

pub async fn execute(registry: &FunctionRegistry, payload: &Path) -> OutcomeEnvelope {
    let bytes = match tokio::fs::read(payload).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return OutcomeEnvelope::failure(
                "IoError",
                format!("cannot read payload {}: {e}", payload.display()),
                String::new(),
            );
        }
    };
    match CallEnvelope::decode(&bytes) {
        Ok(call) => invoke(registry, call).await,
        Err(e) => OutcomeEnvelope::failure("SerializationError", e.to_string(), String::new()),
    }
}

pub async fn invoke(registry: &FunctionRegistry, call: CallEnvelope) -> OutcomeEnvelope {
    let name = call.function().to_string();
    let Some(function) = registry.get(&name) else {
        return OutcomeEnvelope::failure(
            "FunctionNotFound",
            format!(
                "no function named {name:?} is registered (known: {})",
                registry.names().join(", ")
            ),
            String::new(),
        );
    };

    install_panic_hook();
    info!(function = %name, "invoking");
    let handle = tokio::spawn(async move { function.call_dyn(call).await });
    match handle.await {
        Ok(Ok(value)) => OutcomeEnvelope::success(value),
        Ok(Err(err)) => OutcomeEnvelope::from_remote_error(err),
        Err(join) if join.is_panic() => {
            let message = panic_message(join.into_panic());
            let trace = take_panic_trace().unwrap_or_default();
            error!(function = %name, %message, "function panicked");
            OutcomeEnvelope::failure("panic", message, trace)
        }
        Err(join) => OutcomeEnvelope::failure("Cancelled", join.to_string(), String::new()),
    }
}

/// Write `outcome` so a reader never sees a partial file.
pub async fn write_outcome(path: &Path, outcome: &OutcomeEnvelope) -> Result<(), RunnerError> {
    let bytes = outcome.encode()?;
    let tmp = path.with_extension("result.tmp");
    let io_err = |source: std::io::Error| RunnerError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err)?;
    file.write_all(&bytes).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o400))
            .await
            .map_err(io_err)?;
    }
    Ok(())
}

static LAST_PANIC: Mutex<Option<String>> = Mutex::new(None);
static HOOK: Once = Once::new();

/// Record location and backtrace of panics; the previous hook still runs so
/// the message also lands in the job log.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = format!("{info}\n{}", Backtrace::force_capture());
            if let Ok(mut slot) = LAST_PANIC.lock() {
                *slot = Some(trace);
            }
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    LAST_PANIC.lock().ok().and_then(|mut slot| slot.take())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
