//! Serde helpers for floats that may be `NaN` or infinite.
//!
//! Missing p-values are `NaN` and zero-weight hypotheses carry `+inf`, which
//! formats like JSON cannot represent as numbers (serde_json writes `null` and
//! then refuses to read it back as `f64`). Non-finite values are written as the
//! strings `"NaN"`, `"inf"` and `"-inf"`; finite values stay plain numbers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Repr {
    Num(f64),
    Word(String),
}

fn encode(x: f64) -> Repr {
    if x.is_finite() {
        Repr::Num(x)
    } else if x.is_nan() {
        Repr::Word("NaN".into())
    } else if x > 0.0 {
        Repr::Word("inf".into())
    } else {
        Repr::Word("-inf".into())
    }
}

fn decode<E: serde::de::Error>(r: Repr) -> Result<f64, E> {
    match r {
        Repr::Num(x) => Ok(x),
        Repr::Word(w) => match w.as_str() {
            "NaN" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(E::custom(format!(
                "expected a number or one of NaN, inf, -inf; got {other:?}"
            ))),
        },
    }
}

pub(crate) fn serialize<S: Serializer>(v: &[f64], ser: S) -> Result<S::Ok, S::Error> {
    ser.collect_seq(v.iter().map(|&x| encode(x)))
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f64>, D::Error> {
    Vec::<Repr>::deserialize(de)?
        .into_iter()
        .map(decode::<D::Error>)
        .collect()
}

/// Same encoding for a single value.
pub(crate) mod scalar {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(x: &f64, ser: S) -> Result<S::Ok, S::Error> {
        encode(*x).serialize(ser)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
        decode(Repr::deserialize(de)?)
    }
}
