use super::{ApiError, AppState};
use crate::value::{encode, Map, Value};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /v1/status - global flags, object count and live event queues
pub(super) async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let principal = state.auth.authenticate(&headers)?;
    if !principal.can("status/query") {
        return Err(ApiError::no_permission("status/query"));
    }

    let flags = state
        .context
        .flags
        .read()
        .map_err(|_| ApiError::Internal("monitoring flags lock poisoned".to_string()))?
        .to_value();

    let queues: Vec<Value> = state
        .queues
        .stats()
        .into_iter()
        .map(|q| {
            let mut map = Map::new();
            map.insert("name".to_string(), Value::from(q.name));
            map.insert(
                "types".to_string(),
                Value::List(q.types.iter().map(|t| Value::from(t.as_str())).collect()),
            );
            map.insert("subscribers".to_string(), Value::from(q.subscribers as u64));
            Value::Map(map)
        })
        .collect();

    let mut status = Map::new();
    status.insert("flags".to_string(), flags);
    status.insert("objects".to_string(), Value::from(state.context.store.len() as u64));
    status.insert("queues".to_string(), Value::List(queues));

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        encode(&Value::Map(status)),
    )
        .into_response())
}
