use crate::checkable::{now, CheckableRef};
use crate::value::{encode, Map, Value};
use std::fmt;

mod producer;

pub use producer::{EventProducer, EventPublisher};

/// Discriminator carried in every event's `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    CheckResult,
    StateChange,
    AcknowledgementSet,
    AcknowledgementCleared,
    CommentAdded,
    CommentRemoved,
    DowntimeAdded,
    DowntimeRemoved,
    DowntimeTriggered,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::CheckResult,
        EventType::StateChange,
        EventType::AcknowledgementSet,
        EventType::AcknowledgementCleared,
        EventType::CommentAdded,
        EventType::CommentRemoved,
        EventType::DowntimeAdded,
        EventType::DowntimeRemoved,
        EventType::DowntimeTriggered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CheckResult => "CheckResult",
            EventType::StateChange => "StateChange",
            EventType::AcknowledgementSet => "AcknowledgementSet",
            EventType::AcknowledgementCleared => "AcknowledgementCleared",
            EventType::CommentAdded => "CommentAdded",
            EventType::CommentRemoved => "CommentRemoved",
            EventType::DowntimeAdded => "DowntimeAdded",
            EventType::DowntimeRemoved => "DowntimeRemoved",
            EventType::DowntimeTriggered => "DowntimeTriggered",
        }
    }

    /// Exact, case-sensitive match on the wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of a domain occurrence.
///
/// The body is a map that always holds `type` and `timestamp`; everything
/// else is type specific (`host`, `service`, `check_result`, ...).
/// Events are shared between subscribers as `Arc<Event>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    event_type: EventType,
    timestamp: f64,
    body: Value,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self::at(event_type, now())
    }

    pub fn at(event_type: EventType, timestamp: f64) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::from(event_type.as_str()));
        map.insert("timestamp".to_string(), Value::from(timestamp));
        Self {
            event_type,
            timestamp,
            body: Value::Map(map),
        }
    }

    /// Add a field. `type` and `timestamp` cannot be overwritten.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key == "type" || key == "timestamp" {
            return self;
        }
        if let Value::Map(map) = &mut self.body {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Adds `host` and, for services, the short `service` name.
    pub fn for_checkable(self, checkable: &CheckableRef) -> Self {
        let event = self.with("host", checkable.host.as_str());
        match &checkable.service {
            Some(service) => event.with("service", service.as_str()),
            None => event,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Field lookup through nested maps, e.g. `check_result.state`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.body, |value, segment| value.get(segment))
    }

    pub fn as_value(&self) -> &Value {
        &self.body
    }

    /// One newline-terminated wire record.
    ///
    /// Embedded newlines are stripped so every record occupies exactly one line.
    pub fn to_line(&self) -> String {
        let mut line = encode(&self.body).replace('\n', "");
        line.push('\n');
        line
    }
}
