use super::ApiError;
use crate::value::{decode, Map, Value};
use axum::http::Uri;

/// Merge query-string and body parameters into one map.
///
/// Query keys given once become strings, repeated keys become lists. The
/// body must decode to a map; its keys replace query keys of the same name.
pub fn fetch_request_parameters(uri: &Uri, body: &[u8]) -> Result<Map, ApiError> {
    let mut params = Map::new();

    if let Some(query) = uri.query() {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e)))?;
        for (key, value) in pairs {
            let value = Value::from(value);
            match params.remove(&key) {
                None => {
                    params.insert(key, value);
                }
                Some(Value::List(mut items)) => {
                    items.push(value);
                    params.insert(key, Value::List(items));
                }
                Some(previous) => {
                    params.insert(key, Value::List(vec![previous, value]));
                }
            }
        }
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(params);
    }

    match decode(body)? {
        Value::Map(fields) => params.extend(fields),
        _ => {
            return Err(ApiError::BadRequest(
                "Request body must be an object.".to_string(),
            ))
        }
    }
    Ok(params)
}

/// Parameter as a list of strings: a list stays a list, a scalar becomes
/// a one-element list.
pub fn string_list(params: &Map, key: &str) -> Vec<String> {
    match params.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(items)) => items.iter().map(Value::to_text).collect(),
        Some(value) => vec![value.to_text()],
    }
}
