use crate::event::Event;
use crate::value::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Predicate applied to events that already passed a queue's type filter.
#[derive(Clone, Default)]
pub enum EventFilter {
    #[default]
    AcceptAll,
    /// Every listed field (dotted paths allowed) must equal the expected scalar.
    FieldEquals(Map),
    Custom(Arc<dyn Fn(&Event) -> bool + Send + Sync>),
}

impl EventFilter {
    pub fn custom(predicate: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        EventFilter::Custom(Arc::new(predicate))
    }

    /// Build from a client-supplied `filter` value; an empty map accepts all.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(EventFilter::AcceptAll),
            Value::Map(map) if map.is_empty() => Some(EventFilter::AcceptAll),
            Value::Map(map) => {
                let scalars = map
                    .values()
                    .all(|v| !matches!(v, Value::List(_) | Value::Map(_)));
                scalars.then(|| EventFilter::FieldEquals(map.clone()))
            }
            _ => None,
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventFilter::AcceptAll => true,
            EventFilter::FieldEquals(fields) => fields.iter().all(|(path, expected)| {
                event
                    .lookup(path)
                    .is_some_and(|actual| scalar_eq(actual, expected))
            }),
            EventFilter::Custom(predicate) => predicate(event),
        }
    }
}

// Query-string filters arrive as text, so "2" matches 2 and "true" matches true.
fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => false,
        _ => actual.to_text() == expected.to_text(),
    }
}

impl PartialEq for EventFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EventFilter::AcceptAll, EventFilter::AcceptAll) => true,
            (EventFilter::FieldEquals(a), EventFilter::FieldEquals(b)) => a == b,
            (EventFilter::Custom(a), EventFilter::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::AcceptAll => write!(f, "AcceptAll"),
            EventFilter::FieldEquals(fields) => f.debug_tuple("FieldEquals").field(fields).finish(),
            EventFilter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
