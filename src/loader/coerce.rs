//! Lenient numeric deserializers for sidecar fields.
//!
//! Sidecars written by different tools disagree on whether seeds and steps
//! are integers, floats, or strings. Values are accepted when they convert
//! without losing information.

use serde::de::{Deserializer, Error};
use serde::Deserialize;
use serde_json::Value;

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    integer_from(&value).ok_or_else(|| D::Error::custom(format!("expected an integer, found {value}")))
}

pub(crate) fn lenient_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .map(|v| v as f32)
        .ok_or_else(|| D::Error::custom(format!("expected a number, found {value}")))
}

fn integer_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_f64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

fn integral_f64(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}
