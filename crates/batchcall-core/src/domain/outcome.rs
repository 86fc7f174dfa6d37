//! Outcome model: what a finished remote invocation left behind.
//!
//! Written exactly once by the worker, before it exits. A failure is stored
//! as plain fields (type name, message, trace) rather than a live error
//! object, so any caller can read it back.

use serde::{Deserialize, Serialize};

use super::errors::SerializationError;
use crate::typed::RemoteError;
use crate::typed::codec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutcomeEnvelope {
    Success {
        value: serde_json::Value,
    },
    Failure {
        error_type: String,
        message: String,
        trace: String,
    },
}

impl OutcomeEnvelope {
    pub fn success(value: serde_json::Value) -> Self {
        Self::Success { value }
    }

    pub fn failure(
        error_type: impl Into<String>,
        message: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self::Failure {
            error_type: error_type.into(),
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn from_remote_error(err: RemoteError) -> Self {
        Self::Failure {
            error_type: err.error_type,
            message: err.message,
            trace: err.trace,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<serde_json::Value, RemoteError> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Failure {
                error_type,
                message,
                trace,
            } => Err(RemoteError {
                error_type,
                message,
                trace,
            }),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        codec::encode(self, "outcome")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        codec::decode(bytes, "outcome")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_value_roundtrips() {
        let o = OutcomeEnvelope::success(json!({"answer": 42, "items": [1.25, "x", null]}));
        let back = OutcomeEnvelope::decode(&o.encode().unwrap()).unwrap();
        assert_eq!(back, o);
        assert!(back.is_success());
    }

    #[test]
    fn failure_keeps_type_and_message_verbatim() {
        let o = OutcomeEnvelope::from_remote_error(
            RemoteError::new("ValueError", "This job will fail").with_trace("at fail()"),
        );
        let back = OutcomeEnvelope::decode(&o.encode().unwrap()).unwrap();
        let err = back.into_result().unwrap_err();
        assert_eq!(err.error_type, "ValueError");
        assert_eq!(err.message, "This job will fail");
        assert_eq!(err.trace, "at fail()");
    }

    #[test]
    fn truncated_outcome_is_a_serialization_error() {
        let bytes = OutcomeEnvelope::success(json!("a long enough string"))
            .encode()
            .unwrap();
        let err = OutcomeEnvelope::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert_eq!(err.what, "outcome");
    }

    proptest::proptest! {
        #[test]
        fn any_success_value_roundtrips(v in crate::typed::codec::strategies::value()) {
            let outcome = OutcomeEnvelope::success(v);
            let back = OutcomeEnvelope::decode(&outcome.encode().unwrap()).unwrap();
            proptest::prop_assert_eq!(back, outcome);
        }
    }
}
