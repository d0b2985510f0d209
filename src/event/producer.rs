use super::{Event, EventType};
use crate::checkable::{DomainSignal, SignalSink};
use std::sync::Arc;
use tracing::debug;

/// Destination for produced events, implemented by the queue registry.
pub trait EventPublisher: Send + Sync {
    /// Whether any live queue subscribes to `event_type`.
    fn wants(&self, event_type: EventType) -> bool;

    /// Fan the event out. Returns the number of subscribers it reached.
    fn publish(&self, event: Arc<Event>) -> usize;
}

/// Translates domain signals into events.
///
/// Subscribed to the signal bus once at startup. Nothing is built when no
/// queue listens for the resulting type.
pub struct EventProducer {
    publisher: Arc<dyn EventPublisher>,
}

impl EventProducer {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Event type a signal maps to; `None` for signals that produce no event.
    pub fn event_type_of(signal: &DomainSignal) -> Option<EventType> {
        let event_type = match signal {
            DomainSignal::NewCheckResult { .. } => EventType::CheckResult,
            DomainSignal::StateChange { .. } => EventType::StateChange,
            DomainSignal::AcknowledgementSet { .. } => EventType::AcknowledgementSet,
            DomainSignal::AcknowledgementCleared { .. } => EventType::AcknowledgementCleared,
            DomainSignal::CommentAdded { .. } => EventType::CommentAdded,
            DomainSignal::CommentRemoved { .. } => EventType::CommentRemoved,
            DomainSignal::DowntimeAdded { .. } => EventType::DowntimeAdded,
            DomainSignal::DowntimeRemoved { .. } => EventType::DowntimeRemoved,
            DomainSignal::DowntimeTriggered { .. } => EventType::DowntimeTriggered,
            DomainSignal::NotificationsRequested { .. } => return None,
        };
        Some(event_type)
    }

    pub fn build_event(signal: &DomainSignal) -> Option<Event> {
        let event_type = Self::event_type_of(signal)?;
        let event = Event::new(event_type);

        let event = match signal {
            DomainSignal::NewCheckResult {
                checkable,
                check_result,
            } => event
                .for_checkable(checkable)
                .with("check_result", check_result.to_value()),
            DomainSignal::StateChange {
                checkable,
                check_result,
                state,
                state_type,
            } => event
                .for_checkable(checkable)
                .with("state", state.as_number())
                .with("state_type", state_type.as_number())
                .with("check_result", check_result.to_value()),
            DomainSignal::AcknowledgementSet {
                checkable,
                author,
                comment,
                kind,
                notify,
                expiry,
            } => event
                .for_checkable(checkable)
                .with("author", author.as_str())
                .with("comment", comment.as_str())
                .with("acknowledgement_type", kind.as_number())
                .with("notify", *notify)
                .with("expiry", *expiry),
            DomainSignal::AcknowledgementCleared { checkable } => event.for_checkable(checkable),
            DomainSignal::CommentAdded { checkable, comment }
            | DomainSignal::CommentRemoved { checkable, comment } => event
                .for_checkable(checkable)
                .with("comment", comment.to_value()),
            DomainSignal::DowntimeAdded {
                checkable,
                downtime,
            }
            | DomainSignal::DowntimeRemoved {
                checkable,
                downtime,
            }
            | DomainSignal::DowntimeTriggered {
                checkable,
                downtime,
            } => event
                .for_checkable(checkable)
                .with("downtime", downtime.to_value()),
            DomainSignal::NotificationsRequested { .. } => return None,
        };
        Some(event)
    }
}

impl SignalSink for EventProducer {
    fn on_signal(&self, signal: &DomainSignal) {
        let Some(event_type) = Self::event_type_of(signal) else {
            return;
        };
        if !self.publisher.wants(event_type) {
            return;
        }

        debug!(event_type = %event_type, "Processing event");
        if let Some(event) = Self::build_event(signal) {
            self.publisher.publish(Arc::new(event));
        }
    }
}
