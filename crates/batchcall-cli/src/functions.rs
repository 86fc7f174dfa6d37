//! Functions shipped with the `batchcall` binary.
//!
//! The job script runs this same executable on the compute node, so anything
//! registered here is callable remotely by name.

use std::time::Duration;

use async_trait::async_trait;
use batchcall_core::typed::RegistryError;
use batchcall_core::{CallArgs, FunctionRegistry, RemoteError, RemoteFn};
use serde_json::json;

pub struct Add;

#[async_trait]
impl RemoteFn for Add {
    const NAME: &'static str = "add";
    type Output = i64;

    async fn call(&self, args: CallArgs) -> Result<i64, RemoteError> {
        let a: i64 = args.arg(0)?;
        let b: i64 = args.arg(1)?;
        a.checked_add(b)
            .ok_or_else(|| RemoteError::new("OverflowError", format!("{a} + {b} overflows i64")))
    }
}

/// Always fails with `ValueError`.
pub struct Fail;

#[async_trait]
impl RemoteFn for Fail {
    const NAME: &'static str = "fail";
    type Output = ();

    async fn call(&self, _args: CallArgs) -> Result<(), RemoteError> {
        Err(RemoteError::new("ValueError", "This job will fail"))
    }
}

/// Sleeps for `args[0]` seconds and returns the duration.
pub struct Sleep;

#[async_trait]
impl RemoteFn for Sleep {
    const NAME: &'static str = "sleep";
    type Output = f64;

    async fn call(&self, args: CallArgs) -> Result<f64, RemoteError> {
        let secs: f64 = args.arg(0)?;
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| RemoteError::new("ValueError", format!("bad duration {secs}: {e}")))?;
        tracing::info!(?duration, "sleeping");
        tokio::time::sleep(duration).await;
        Ok(secs)
    }
}

/// Returns its arguments unchanged.
pub struct Echo;

#[async_trait]
impl RemoteFn for Echo {
    const NAME: &'static str = "echo";
    type Output = serde_json::Value;

    async fn call(&self, args: CallArgs) -> Result<serde_json::Value, RemoteError> {
        let call = args.envelope();
        println!("echo called with {} argument(s)", call.args().len());
        Ok(json!({ "args": call.args(), "kwargs": call.kwargs() }))
    }
}

pub struct Panic;

#[async_trait]
impl RemoteFn for Panic {
    const NAME: &'static str = "panic";
    type Output = ();

    async fn call(&self, args: CallArgs) -> Result<(), RemoteError> {
        let message: String = args.kwarg_or("message", "requested panic".to_string())?;
        panic!("{message}");
    }
}

pub fn registry() -> Result<FunctionRegistry, RegistryError> {
    let mut registry = FunctionRegistry::new();
    registry.register(Add)?;
    registry.register(Fail)?;
    registry.register(Sleep)?;
    registry.register(Echo)?;
    registry.register(Panic)?;
    Ok(registry)
}
