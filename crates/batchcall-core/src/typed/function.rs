//! RemoteFn trait - 名前で呼び出せる関数の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types (`type Output`)
//! - クロージャは送れないので、「名前 → 実装」の対応を両プロセスで共有する
//!
//! # 使用例
//! ```ignore
//! struct Add;
//!
//! #[async_trait]
//! impl RemoteFn for Add {
//!     const NAME: &'static str = "add";
//!     type Output = i64;
//!
//!     async fn call(&self, args: CallArgs) -> Result<i64, RemoteError> {
//!         Ok(args.arg::<i64>(0)? + args.arg::<i64>(1)?)
//!     }
//! }
//! ```

use std::backtrace::Backtrace;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::CallEnvelope;

/// A function the worker can resolve by name.
///
/// # Trait Bounds
/// - `Output: Serialize`: outcome ファイルへの保存のため
/// - `Send + Sync + 'static`: registry の `Arc` に格納するため
#[async_trait]
pub trait RemoteFn: Send + Sync + 'static {
    /// 呼び出し側とワーカー側で共通の名前
    const NAME: &'static str;

    type Output: Serialize + Send;

    async fn call(&self, args: CallArgs) -> Result<Self::Output, RemoteError>;
}

/// An error raised inside a remote invocation.
///
/// Mirrors what the caller will see: the original type name, the message
/// verbatim and a human-readable trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub error_type: String,
    pub message: String,
    pub trace: String,
}

impl RemoteError {
    /// Build an error with an explicit type name; the trace is the current
    /// backtrace.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Capture any `std::error::Error`, keeping its type name and `source()`
    /// chain.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        let mut trace = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str(&format!("caused by: {cause}\n"));
            source = cause.source();
        }
        trace.push_str(&Backtrace::force_capture().to_string());
        Self {
            error_type: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            trace,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Positional and keyword arguments handed to a [`RemoteFn`].
#[derive(Debug, Clone)]
pub struct CallArgs {
    call: CallEnvelope,
}

impl CallArgs {
    pub fn new(call: CallEnvelope) -> Self {
        Self { call }
    }

    pub fn function(&self) -> &str {
        self.call.function().as_str()
    }

    pub fn len(&self) -> usize {
        self.call.args().len()
    }

    pub fn is_empty(&self) -> bool {
        self.call.args().is_empty()
    }

    /// Positional argument `index`, decoded as `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, RemoteError> {
        let value = self.call.args().get(index).ok_or_else(|| {
            RemoteError::new(
                "ArgumentError",
                format!(
                    "{}() missing positional argument #{index} ({} given)",
                    self.function(),
                    self.len()
                ),
            )
        })?;
        self.decode(value, || format!("argument #{index}"))
    }

    /// Keyword argument `name`; `None` if it was not given.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, RemoteError> {
        match self.call.kwargs().get(name) {
            Some(value) => self
                .decode(value, || format!("keyword argument {name:?}"))
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn kwarg_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, RemoteError> {
        Ok(self.kwarg(name)?.unwrap_or(default))
    }

    pub fn envelope(&self) -> &CallEnvelope {
        &self.call
    }

    fn decode<T: DeserializeOwned>(
        &self,
        value: &serde_json::Value,
        what: impl FnOnce() -> String,
    ) -> Result<T, RemoteError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            RemoteError::new(
                "ArgumentError",
                format!("{}() got an invalid {}: {e}", self.function(), what()),
            )
        })
    }
}
