use super::params::{fetch_request_parameters, string_list};
use super::{ApiError, AppState};
use crate::action::params as action_params;
use crate::event::EventType;
use crate::process::ProcessControl;
use crate::subscription::{EventFilter, QueueConfig, Subscription, WaitError};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri, Version},
    response::Response,
};
use futures::stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

/// POST /v1/events - stream matching events as newline-delimited records
pub(super) async fn subscribe_events(
    State(state): State<Arc<AppState>>,
    version: Version,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    if version < Version::HTTP_11 {
        return Err(ApiError::BadRequest(
            "HTTP/1.0 not supported for event streams.".to_string(),
        ));
    }

    let principal = state.auth.authenticate(&headers)?;
    let params = fetch_request_parameters(&uri, &body)?;

    let names = string_list(&params, "types");
    if names.is_empty() {
        return Err(ApiError::BadRequest(
            "'types' attribute is required.".to_string(),
        ));
    }
    let mut types = Vec::with_capacity(names.len());
    for name in &names {
        let event_type = EventType::parse(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid event type '{}'.", name)))?;
        let permission = format!("events/{}", event_type);
        if !principal.can(&permission) {
            return Err(ApiError::no_permission(&permission));
        }
        types.push(event_type);
    }

    let queue = action_params::text(&params, "queue").unwrap_or_default();
    if queue.is_empty() {
        return Err(ApiError::BadRequest(
            "'queue' attribute is required.".to_string(),
        ));
    }

    let filter = match params.get("filter") {
        None => EventFilter::AcceptAll,
        Some(value) => EventFilter::from_value(value)
            .ok_or_else(|| ApiError::BadRequest("Invalid 'filter' attribute.".to_string()))?,
    };
    let ttl = action_params::optional_number(&params, "ttl")
        .map_err(|_| ApiError::BadRequest("'ttl' must be a number.".to_string()))?
        .unwrap_or(state.default_ttl);

    let config = QueueConfig::new(types).with_filter(filter).with_ttl(ttl);
    let subscription = state.queues.subscribe(&queue, config)?;
    info!(
        queue = %queue,
        user = %principal.name(),
        types = ?names,
        "Event stream opened"
    );

    let stream = event_stream(subscription, state.context.process.clone());
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(response)
}

/// One encoded event per item until the subscriber is closed or the
/// process is asked to stop.
///
/// The subscription travels inside the stream state, so dropping the
/// response body (client gone) detaches the subscriber.
fn event_stream(
    subscription: Subscription,
    process: ProcessControl,
) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::unfold(
        (subscription, process),
        |(subscription, process)| async move {
            let cancel = {
                let process = process.clone();
                async move {
                    process.requested().await;
                }
            };
            let next = subscription.next_event(cancel).await;
            match next {
                Ok(event) => Some((
                    Ok(Bytes::from(event.to_line())),
                    (subscription, process),
                )),
                Err(WaitError::Cancelled) => {
                    info!(queue = %subscription.queue_name(), "Event stream closed for shutdown");
                    None
                }
                Err(WaitError::Disconnected) => {
                    info!(queue = %subscription.queue_name(), "Event stream closed by server");
                    None
                }
            }
        },
    )
}
