use super::params::fetch_request_parameters;
use super::{ApiError, AppState};
use crate::action::params;
use crate::checkable::{CheckableKind, ObjectHandle};
use crate::value::{encode, Map};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
};
use std::sync::Arc;

/// POST /v1/actions/:name - run one action and return its result
pub(super) async fn invoke_action(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let principal = state.auth.authenticate(&headers)?;

    let permission = format!("actions/{}", name.replace('_', "-"));
    if !principal.can(&permission) {
        return Err(ApiError::no_permission(&permission));
    }

    let params = fetch_request_parameters(&uri, &body)?;

    let target = match state.actions.get(&name) {
        Some(descriptor) if !descriptor.is_global() => resolve_target(&state, &params)?,
        _ => None,
    };

    let result = state
        .actions
        .dispatch(&state.context, &name, target.as_ref(), &params);

    let status = StatusCode::from_u16(result.code().as_u16())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(encode(&result.to_value())))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Find the object named by `type`, `host` and `service`.
///
/// A missing or unknown `type` yields no target and leaves the
/// applicability decision to the dispatcher.
fn resolve_target(state: &AppState, p: &Map) -> Result<Option<Arc<ObjectHandle>>, ApiError> {
    let Some(kind) = params::text(p, "type").and_then(|t| CheckableKind::parse(&t)) else {
        return Ok(None);
    };

    let host = params::text(p, "host").unwrap_or_default();
    let name = match kind {
        CheckableKind::Host => host,
        CheckableKind::Service => {
            let service = params::text(p, "service").unwrap_or_default();
            // Accept both the short name plus `host` and the full "host!service".
            if service.contains('!') {
                service
            } else {
                format!("{}!{}", host, service)
            }
        }
    };

    state
        .context
        .store
        .get(kind, &name)
        .map(Some)
        .ok_or_else(|| ApiError::NotFound("No objects found.".to_string()))
}
