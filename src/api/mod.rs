// HTTP API: event streams, action invocation and status

mod actions;
mod error;
mod events;
mod params;
mod status;

pub use error::ApiError;
pub use params::fetch_request_parameters;

use crate::action::{ActionContext, ActionRegistry};
use crate::auth::Authenticator;
use crate::checkable::{ObjectStore, SignalBus};
use crate::config::{new_monitoring_flags, LookoutConfig};
use crate::event::EventProducer;
use crate::process::ProcessControl;
use crate::subscription::EventQueueRegistry;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub actions: ActionRegistry,
    pub context: ActionContext,
    pub queues: Arc<EventQueueRegistry>,
    pub auth: Authenticator,
    /// TTL applied to queues whose subscribe request names none
    pub default_ttl: f64,
}

impl AppState {
    /// Wire every component from `config`.
    ///
    /// The event producer is subscribed to the object store's signal bus
    /// here, so the returned state is ready to serve.
    pub fn from_config(config: &LookoutConfig, process: ProcessControl) -> Self {
        let signals = Arc::new(SignalBus::new());
        let store = Arc::new(ObjectStore::new(Arc::clone(&signals)));
        let seeded = config.populate(&store);

        let queues = Arc::new(EventQueueRegistry::new(config.events.registry_options()));
        signals.subscribe(Arc::new(EventProducer::new(queues.clone())));

        let actions = ActionRegistry::with_builtin_actions();
        let auth = Authenticator::new(config.api_users.clone());
        info!(
            objects = seeded,
            actions = actions.len(),
            auth_enabled = auth.is_enabled(),
            "Components initialized"
        );

        Self {
            actions,
            context: ActionContext {
                store,
                flags: new_monitoring_flags(config.monitoring),
                process,
            },
            queues,
            auth,
            default_ttl: config.events.default_ttl_seconds,
        }
    }
}

/// Create API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/events", post(events::subscribe_events))
        .route("/v1/actions/:name", post(actions::invoke_action))
        .route("/v1/status", get(status::get_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
