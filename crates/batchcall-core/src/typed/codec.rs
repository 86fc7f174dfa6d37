//! Codec - envelope と bytes の相互変換
//!
//! payload / outcome ファイルは MessagePack（rmp-serde, named fields）で保存します。
//! self-describing なので `serde_json::Value` をそのまま往復できます。
//! バージョン間のバイナリ互換性は保証しません。

use std::fmt;

use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::SerializationError;

/// Encode `value`; `what` names it in the error.
pub fn encode<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Vec<u8>, SerializationError> {
    rmp_serde::to_vec_named(value).map_err(|e| SerializationError::new(what, e))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, SerializationError> {
    rmp_serde::from_slice(bytes).map_err(|e| SerializationError::new(what, e))
}

/// Convert a caller-side value into the transport value model.
///
/// Non-finite floats are rejected: the value model has no NaN or infinity
/// and would otherwise store them as `null`.
pub fn to_value<T: Serialize + ?Sized>(
    value: &T,
    what: &str,
) -> Result<serde_json::Value, SerializationError> {
    let packed = rmp_serde::to_vec(value).map_err(|e| SerializationError::new(what, e))?;
    rmp_serde::from_slice::<FiniteOnly>(&packed).map_err(|e| SerializationError::new(what, e))?;
    serde_json::to_value(value).map_err(|e| SerializationError::new(what, e))
}

pub fn from_value<T: DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, SerializationError> {
    serde_json::from_value(value).map_err(|e| SerializationError::new(what, e))
}

/// Accepts any MessagePack document whose floats are all finite.
struct FiniteOnly;

impl<'de> Deserialize<'de> for FiniteOnly {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FiniteOnlyVisitor)
    }
}

struct FiniteOnlyVisitor;

impl<'de> Visitor<'de> for FiniteOnlyVisitor {
    type Value = FiniteOnly;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a value without NaN or infinite floats")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FiniteOnly, E> {
        if v.is_finite() {
            Ok(FiniteOnly)
        } else {
            Err(E::custom(format!("non-finite float {v} cannot be transported")))
        }
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_unit<E: de::Error>(self) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_none<E: de::Error>(self) -> Result<FiniteOnly, E> {
        Ok(FiniteOnly)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<FiniteOnly, D::Error> {
        FiniteOnly::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FiniteOnly, A::Error> {
        while seq.next_element::<FiniteOnly>()?.is_some() {}
        Ok(FiniteOnly)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FiniteOnly, A::Error> {
        while map.next_entry::<FiniteOnly, FiniteOnly>()?.is_some() {}
        Ok(FiniteOnly)
    }
}

#[cfg(test)]
pub(crate) mod strategies {
    //! proptest strategies for the transport value model

    use proptest::prelude::*;
    use serde_json::Value;

    /// Arbitrary nested `Value` with finite floats only.
    pub fn value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<u64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            ".{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map(".{0,8}", inner, 0..8)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    pub fn non_finite() -> impl Strategy<Value = f64> {
        prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: f64,
        y: f64,
        tags: Vec<String>,
    }

    #[test]
    fn nested_values_survive_encoding() {
        let v = json!({
            "ints": [1, -2, 3],
            "nested": {"a": {"b": [true, null, "s"]}},
            "float": 1.5,
        });
        let bytes = encode(&v, "value").unwrap();
        let back: serde_json::Value = decode(&bytes, "value").unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn user_defined_types_go_through_values() {
        let p = Point {
            x: 1.0,
            y: -2.5,
            tags: vec!["a".into()],
        };
        let v = to_value(&p, "point").unwrap();
        let back: Point = from_value(v, "point").unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn non_string_map_keys_are_rejected_with_the_value_name() {
        let mut m = HashMap::new();
        m.insert((1, 2), 3);
        let err = to_value(&m, "argument #0").unwrap_err();
        assert_eq!(err.what, "argument #0");
    }

    #[test]
    fn non_finite_floats_are_rejected_not_nulled() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = to_value(&v, "argument #0").unwrap_err();
            assert_eq!(err.what, "argument #0");
            assert!(err.reason.contains("non-finite"), "{err}");
        }
        let err = to_value(&Some(f32::NAN), "value").unwrap_err();
        assert!(err.reason.contains("non-finite"));

        let nested = json!({"ok": 1});
        assert!(to_value(&nested, "value").is_ok());
        let p = Point {
            x: 0.5,
            y: f64::INFINITY,
            tags: vec![],
        };
        assert!(to_value(&p, "point").is_err());
    }

    #[test]
    fn integer_map_keys_still_convert() {
        let m: HashMap<u32, &str> = [(7, "seven")].into_iter().collect();
        assert_eq!(to_value(&m, "value").unwrap(), json!({"7": "seven"}));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode::<serde_json::Value>(&[0xc1], "outcome file").unwrap_err();
        assert_eq!(err.what, "outcome file");
    }

    proptest::proptest! {
        #[test]
        fn any_value_survives_encoding(v in strategies::value()) {
            let bytes = encode(&v, "value").unwrap();
            let back: serde_json::Value = decode(&bytes, "value").unwrap();
            proptest::prop_assert_eq!(back, v.clone());
            proptest::prop_assert_eq!(to_value(&v, "value").unwrap(), v);
        }
    }
}
