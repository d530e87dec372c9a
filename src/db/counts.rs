//! Decoding of persisted vote counts.
//!
//! A count written by one client may come back from storage as an integer
//! (`3`) or as a float (`3.0`), depending on who wrote it. Both are
//! normalized here, once per read, so the increment path only sees `u64`.

use crate::error::{RegistryError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

// Largest float that still maps to an exact integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Normalizes one stored count to an integer.
///
/// Integral floats are accepted; negative, fractional, non-finite and
/// non-numeric values are reported as corrupt rather than coerced.
pub fn decode_count(option: &str, value: &Value) -> Result<u64> {
    let corrupt = || RegistryError::CorruptCount {
        option: option.to_string(),
        value: value.to_string(),
    };

    let Value::Number(number) = value else {
        return Err(corrupt());
    };

    if let Some(count) = number.as_u64() {
        return Ok(count);
    }
    if number.is_i64() {
        // as_u64 already failed, so the integer is negative
        return Err(corrupt());
    }

    match number.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= MAX_EXACT_FLOAT => {
            Ok(f as u64)
        }
        _ => Err(corrupt()),
    }
}

/// Decodes a stored `{option: count}` document.
pub fn decode_votes(raw: &str) -> Result<HashMap<String, u64>> {
    let stored: Map<String, Value> = serde_json::from_str(raw)?;
    stored
        .iter()
        .map(|(option, value)| Ok((option.clone(), decode_count(option, value)?)))
        .collect()
}

pub fn encode_votes(votes: &HashMap<String, u64>) -> Result<String> {
    Ok(serde_json::to_string(votes)?)
}
