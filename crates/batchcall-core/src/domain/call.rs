//! CallEnvelope: an immutable description of a deferred invocation.
//!
//! The function is referenced by a stable name, never by captured code; the
//! worker process resolves the name in its own registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::SerializationError;
use crate::typed::RemoteFn;
use crate::typed::codec;

/// Stable name of a registered remote function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionRef(String);

impl FunctionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    function: FunctionRef,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    #[serde(default)]
    kwargs: BTreeMap<String, serde_json::Value>,
}

impl CallEnvelope {
    /// Build from values that are already in the transport model.
    pub fn new(
        function: FunctionRef,
        args: Vec<serde_json::Value>,
        kwargs: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            function,
            args,
            kwargs,
        }
    }

    pub fn builder(function: impl Into<String>) -> CallBuilder {
        CallBuilder::new(FunctionRef::new(function))
    }

    /// Builder whose function name comes from a registered [`RemoteFn`] type.
    pub fn builder_for<F: RemoteFn>() -> CallBuilder {
        Self::builder(F::NAME)
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.kwargs
    }

    pub fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        codec::encode(self, "call envelope")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        codec::decode(bytes, "call envelope")
    }
}

/// Collects arguments; the first value that fails to convert is reported by
/// [`CallBuilder::build`].
#[derive(Debug)]
pub struct CallBuilder {
    function: FunctionRef,
    args: Vec<serde_json::Value>,
    kwargs: BTreeMap<String, serde_json::Value>,
    error: Option<SerializationError>,
}

impl CallBuilder {
    fn new(function: FunctionRef) -> Self {
        Self {
            function,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            error: None,
        }
    }

    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_none() {
            let what = format!("argument #{}", self.args.len());
            match codec::to_value(value, &what) {
                Ok(v) => self.args.push(v),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        if self.error.is_none() {
            let name = name.into();
            let what = format!("keyword argument {name:?}");
            match codec::to_value(value, &what) {
                Ok(v) => {
                    self.kwargs.insert(name, v);
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn build(self) -> Result<CallEnvelope, SerializationError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(CallEnvelope {
            function: self.function,
            args: self.args,
            kwargs: self.kwargs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        weights: Vec<f64>,
    }

    #[test]
    fn builder_collects_args_and_kwargs() {
        let call = CallEnvelope::builder("add")
            .arg(&1)
            .arg(&2)
            .kwarg("label", "sum")
            .build()
            .unwrap();
        assert_eq!(call.function().as_str(), "add");
        assert_eq!(call.args(), &[json!(1), json!(2)]);
        assert_eq!(call.kwargs()["label"], json!("sum"));
    }

    #[test]
    fn encoded_call_decodes_to_the_same_envelope() {
        let call = CallEnvelope::builder("fit")
            .arg(&Sample {
                name: "s".into(),
                weights: vec![0.5, 1.0],
            })
            .arg(&vec![vec![1, 2], vec![3]])
            .kwarg("opts", &json!({"deep": {"list": [null, true]}}))
            .build()
            .unwrap();

        let bytes = call.encode().unwrap();
        assert_eq!(CallEnvelope::decode(&bytes).unwrap(), call);
    }

    #[test]
    fn first_bad_argument_is_named() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);

        let err = CallEnvelope::builder("f")
            .arg(&0)
            .arg(&bad)
            .kwarg("also_bad", &bad)
            .build()
            .unwrap_err();
        assert_eq!(err.what, "argument #1");

        let err = CallEnvelope::builder("f")
            .kwarg("scale", &bad)
            .build()
            .unwrap_err();
        assert_eq!(err.what, "keyword argument \"scale\"");
    }

    #[test]
    fn non_finite_floats_are_rejected_by_position() {
        let err = CallEnvelope::builder("f")
            .arg(&1.0)
            .arg(&f64::NAN)
            .arg(&f64::INFINITY)
            .build()
            .unwrap_err();
        assert_eq!(err.what, "argument #1");
        assert!(err.reason.contains("non-finite"));

        let err = CallEnvelope::builder("f")
            .kwarg("x", &Some(f64::NEG_INFINITY))
            .build()
            .unwrap_err();
        assert_eq!(err.what, "keyword argument \"x\"");

        let err = CallEnvelope::builder("f")
            .arg(&Sample {
                name: "s".into(),
                weights: vec![0.5, f64::NAN],
            })
            .build()
            .unwrap_err();
        assert_eq!(err.what, "argument #0");
    }

    mod properties {
        use super::*;
        use crate::typed::codec::strategies;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_call_round_trips(
                args in prop::collection::vec(strategies::value(), 0..4),
                kwargs in prop::collection::btree_map("[a-z_]{1,8}", strategies::value(), 0..4),
            ) {
                let mut builder = CallEnvelope::builder("f");
                for a in &args {
                    builder = builder.arg(a);
                }
                for (k, v) in &kwargs {
                    builder = builder.kwarg(k.as_str(), v);
                }
                let call = builder.build().unwrap();
                prop_assert_eq!(call.args(), &args[..]);
                prop_assert_eq!(call.kwargs(), &kwargs);

                let back = CallEnvelope::decode(&call.encode().unwrap()).unwrap();
                prop_assert_eq!(back, call);
            }

            #[test]
            fn non_finite_float_anywhere_is_rejected(
                v in strategies::value(),
                bad in strategies::non_finite(),
            ) {
                let err = CallEnvelope::builder("f").arg(&(v, vec![bad])).build().unwrap_err();
                prop_assert_eq!(err.what, "argument #0");
            }
        }
    }
}
