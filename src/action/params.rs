// Parameter access for action handlers.
//
// Parameters may arrive from a decoded body or from a query string, so a
// key can hold a list (repeated query parameter) and numbers may be strings.
// Lookups always use the last value given for a key.

use super::ActionResult;
use crate::value::{Map, Value};

/// Last value supplied for `key`; `None` if absent or null.
pub fn last<'a>(params: &'a Map, key: &str) -> Option<&'a Value> {
    match params.get(key)? {
        Value::Null => None,
        Value::List(items) => items.last().filter(|v| !v.is_null()),
        value => Some(value),
    }
}

pub fn contains(params: &Map, key: &str) -> bool {
    last(params, key).is_some()
}

pub fn text(params: &Map, key: &str) -> Option<String> {
    last(params, key).map(Value::to_text)
}

pub fn flag(params: &Map, key: &str) -> bool {
    last(params, key).is_some_and(Value::to_bool)
}

/// Required string parameter; 403 result when missing.
pub fn require_text(params: &Map, key: &str) -> Result<String, ActionResult> {
    text(params, key).ok_or_else(|| missing(key))
}

/// Required numeric parameter; 403 result when missing or not numeric.
pub fn require_number(params: &Map, key: &str) -> Result<f64, ActionResult> {
    let value = last(params, key).ok_or_else(|| missing(key))?;
    value
        .to_number()
        .ok_or_else(|| ActionResult::invalid(format!("Parameter '{}' must be a number.", key)))
}

/// Optional numeric parameter; 403 result when present but not numeric.
pub fn optional_number(params: &Map, key: &str) -> Result<Option<f64>, ActionResult> {
    match last(params, key) {
        None => Ok(None),
        Some(value) => value.to_number().map(Some).ok_or_else(|| {
            ActionResult::invalid(format!("Parameter '{}' must be a number.", key))
        }),
    }
}

/// Required non-negative integer identifier (legacy ids).
pub fn require_id(params: &Map, key: &str) -> Result<u64, ActionResult> {
    let n = require_number(params, key)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(ActionResult::invalid(format!(
            "Parameter '{}' must be a non-negative integer.",
            key
        )));
    }
    Ok(n as u64)
}

fn missing(key: &str) -> ActionResult {
    ActionResult::invalid(format!("Parameter '{}' is required.", key))
}
