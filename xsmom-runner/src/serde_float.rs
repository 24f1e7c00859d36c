//! Serde adapters for floats that may be non-finite.
//!
//! JSON has no infinities. The top-level adapter is for sweep scores: non-finite
//! values are written as `null` and read back as `f64::NEG_INFINITY` (an
//! excluded candidate). [`metric`] keeps the exact value for report metrics.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
}

/// Finite values as numbers; `inf`, `-inf` and `NaN` as strings.
///
/// A `null` reads back as `NaN`.
pub mod metric {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(f64::NAN),
            Some(Repr::Number(v)) => Ok(v),
            Some(Repr::Text(s)) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid float: {other:?}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Metric {
        #[serde(with = "super::metric")]
        value: f64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Scored {
        #[serde(with = "super")]
        score: f64,
    }

    #[test]
    fn negative_infinity_survives_json() {
        let json = serde_json::to_string(&Scored {
            score: f64::NEG_INFINITY,
        })
        .unwrap();
        assert_eq!(json, r#"{"score":null}"#);
        let back: Scored = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, f64::NEG_INFINITY);
    }

    #[test]
    fn finite_values_pass_through() {
        let json = serde_json::to_string(&Scored { score: 1.5 }).unwrap();
        assert_eq!(json, r#"{"score":1.5}"#);
        let back: Scored = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, 1.5);
    }

    #[test]
    fn metric_keeps_infinities() {
        for (v, text) in [
            (f64::INFINITY, r#"{"value":"inf"}"#),
            (f64::NEG_INFINITY, r#"{"value":"-inf"}"#),
            (2.25, r#"{"value":2.25}"#),
        ] {
            let json = serde_json::to_string(&Metric { value: v }).unwrap();
            assert_eq!(json, text);
            let back: Metric = serde_json::from_str(&json).unwrap();
            assert_eq!(back.value, v);
        }
    }

    #[test]
    fn metric_nan_and_null_read_as_nan() {
        let json = serde_json::to_string(&Metric { value: f64::NAN }).unwrap();
        assert_eq!(json, r#"{"value":"NaN"}"#);
        assert!(serde_json::from_str::<Metric>(&json).unwrap().value.is_nan());
        assert!(serde_json::from_str::<Metric>(r#"{"value":null}"#).unwrap().value.is_nan());
        assert!(serde_json::from_str::<Metric>(r#"{"value":"big"}"#).is_err());
    }
}
