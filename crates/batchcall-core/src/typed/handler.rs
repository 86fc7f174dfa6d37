//! DynFunction - 型消去された RemoteFn
//!
//! # 学習ポイント
//! - Object-safe trait (DynFunction)
//! - Type erasure パターン (TypedFunction<F> → DynFunction)

use async_trait::async_trait;

use super::codec;
use super::function::{CallArgs, RemoteError, RemoteFn};
use crate::domain::CallEnvelope;

/// DynFunction は object-safe な RemoteFn の抽象化
///
/// TypedFunction<F> を DynFunction に変換することで、
/// HashMap<String, Arc<dyn DynFunction>> に格納可能にします。
#[async_trait]
pub trait DynFunction: Send + Sync {
    async fn call_dyn(&self, call: CallEnvelope) -> Result<serde_json::Value, RemoteError>;
    fn name(&self) -> &str;
}

pub struct TypedFunction<F: RemoteFn> {
    function: F,
}

impl<F: RemoteFn> TypedFunction<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

#[async_trait]
impl<F: RemoteFn> DynFunction for TypedFunction<F> {
    async fn call_dyn(&self, call: CallEnvelope) -> Result<serde_json::Value, RemoteError> {
        let output = self.function.call(CallArgs::new(call)).await?;
        codec::to_value(&output, &format!("return value of {:?}", F::NAME))
            .map_err(|e| RemoteError::new("SerializationError", e.to_string()))
    }

    fn name(&self) -> &str {
        F::NAME
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! テスト用の RemoteFn

    use super::*;

    pub struct Add;

    #[async_trait]
    impl RemoteFn for Add {
        const NAME: &'static str = "add";
        type Output = i64;

        async fn call(&self, args: CallArgs) -> Result<i64, RemoteError> {
            Ok(args.arg::<i64>(0)? + args.arg::<i64>(1)?)
        }
    }

    pub struct Fail;

    #[async_trait]
    impl RemoteFn for Fail {
        const NAME: &'static str = "fail";
        type Output = ();

        async fn call(&self, _args: CallArgs) -> Result<(), RemoteError> {
            Err(RemoteError::new("ValueError", "This job will fail"))
        }
    }

    pub struct Explode;

    #[async_trait]
    impl RemoteFn for Explode {
        const NAME: &'static str = "explode";
        type Output = ();

        async fn call(&self, _args: CallArgs) -> Result<(), RemoteError> {
            panic!("boom");
        }
    }

    pub struct Ratio;

    /// `args[0] / args[1]`, infinite when dividing by zero.
    #[async_trait]
    impl RemoteFn for Ratio {
        const NAME: &'static str = "ratio";
        type Output = f64;

        async fn call(&self, args: CallArgs) -> Result<f64, RemoteError> {
            Ok(args.arg::<f64>(0)? / args.arg::<f64>(1)?)
        }
    }

    pub struct BadOutput;

    #[async_trait]
    impl RemoteFn for BadOutput {
        const NAME: &'static str = "bad_output";
        type Output = std::collections::HashMap<(u8, u8), u8>;

        async fn call(&self, _args: CallArgs) -> Result<Self::Output, RemoteError> {
            Ok([((1, 2), 3)].into_iter().collect())
        }
    }
}
