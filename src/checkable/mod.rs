// Monitored objects (hosts and services) as seen by actions and events.
//
// Only the operations actions invoke are modelled here; scheduling and
// check execution live elsewhere.

mod object;
mod signal;
mod store;

pub use object::{Checkable, CheckableKind, CheckableRef};
pub use signal::{DomainSignal, SignalBus, SignalSink};
pub use store::{AckOutcome, DowntimeRequest, ObjectHandle, ObjectStore, StoreError};

use crate::value::{Map, Value};
use chrono::Utc;

#[cfg(test)]
mod tests;

/// Current wall-clock time as fractional Unix seconds.
pub fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Plugin exit code convention: 0 OK, 1 WARNING, 2 CRITICAL, anything else UNKNOWN.
    pub fn from_exit_status(exit_status: i64) -> Self {
        match exit_status {
            0 => ServiceState::Ok,
            1 => ServiceState::Warning,
            2 => ServiceState::Critical,
            _ => ServiceState::Unknown,
        }
    }
}

/// State of a checkable; the variant always matches the checkable's kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckState {
    Host(HostState),
    Service(ServiceState),
}

impl CheckState {
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            CheckState::Host(HostState::Up) | CheckState::Service(ServiceState::Ok)
        )
    }

    pub fn as_number(&self) -> i64 {
        match self {
            CheckState::Host(HostState::Up) => 0,
            CheckState::Host(HostState::Down) => 1,
            CheckState::Service(ServiceState::Ok) => 0,
            CheckState::Service(ServiceState::Warning) => 1,
            CheckState::Service(ServiceState::Critical) => 2,
            CheckState::Service(ServiceState::Unknown) => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckState::Host(HostState::Up) => "UP",
            CheckState::Host(HostState::Down) => "DOWN",
            CheckState::Service(ServiceState::Ok) => "OK",
            CheckState::Service(ServiceState::Warning) => "WARNING",
            CheckState::Service(ServiceState::Critical) => "CRITICAL",
            CheckState::Service(ServiceState::Unknown) => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateType {
    Soft,
    Hard,
}

impl StateType {
    pub fn as_number(&self) -> i64 {
        match self {
            StateType::Soft => 0,
            StateType::Hard => 1,
        }
    }
}

/// Result of a single check. Replaces the previous one wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckResult {
    pub output: String,
    pub state: CheckState,
    pub performance_data: Value,
    pub command: Value,
    pub execution_start: f64,
    pub execution_end: f64,
    pub schedule_start: f64,
    pub schedule_end: f64,
    pub check_source: String,
}

impl CheckResult {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("output".to_string(), Value::from(self.output.as_str()));
        map.insert("state".to_string(), Value::from(self.state.as_number()));
        map.insert("performance_data".to_string(), self.performance_data.clone());
        map.insert("command".to_string(), self.command.clone());
        map.insert("execution_start".to_string(), Value::from(self.execution_start));
        map.insert("execution_end".to_string(), Value::from(self.execution_end));
        map.insert("schedule_start".to_string(), Value::from(self.schedule_start));
        map.insert("schedule_end".to_string(), Value::from(self.schedule_end));
        map.insert("check_source".to_string(), Value::from(self.check_source.as_str()));
        Value::Map(map)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentType {
    User,
    Acknowledgement,
}

impl CommentType {
    pub fn as_number(&self) -> i64 {
        match self {
            CommentType::User => 1,
            CommentType::Acknowledgement => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
    /// Opaque identifier
    pub id: String,
    /// Small integer alias for human-facing APIs
    pub legacy_id: u64,
    pub entry_type: CommentType,
    pub author: String,
    pub text: String,
    pub entry_time: f64,
    /// 0 = never expires
    pub expire_time: f64,
}

impl Comment {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("legacy_id".to_string(), Value::from(self.legacy_id));
        map.insert("entry_type".to_string(), Value::from(self.entry_type.as_number()));
        map.insert("author".to_string(), Value::from(self.author.as_str()));
        map.insert("text".to_string(), Value::from(self.text.as_str()));
        map.insert("entry_time".to_string(), Value::from(self.entry_time));
        map.insert("expire_time".to_string(), Value::from(self.expire_time));
        Value::Map(map)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Downtime {
    pub id: String,
    pub legacy_id: u64,
    pub author: String,
    pub comment: String,
    pub entry_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub fixed: bool,
    /// Opaque id of the downtime whose start triggers this one
    pub triggered_by: Option<String>,
    pub trigger_time: Option<f64>,
}

impl Downtime {
    pub fn is_triggered(&self) -> bool {
        self.trigger_time.is_some()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("legacy_id".to_string(), Value::from(self.legacy_id));
        map.insert("author".to_string(), Value::from(self.author.as_str()));
        map.insert("comment".to_string(), Value::from(self.comment.as_str()));
        map.insert("entry_time".to_string(), Value::from(self.entry_time));
        map.insert("start_time".to_string(), Value::from(self.start_time));
        map.insert("end_time".to_string(), Value::from(self.end_time));
        map.insert("duration".to_string(), Value::from(self.duration));
        map.insert("fixed".to_string(), Value::from(self.fixed));
        map.insert(
            "triggered_by".to_string(),
            Value::from(self.triggered_by.clone().unwrap_or_default()),
        );
        map.insert("trigger_time".to_string(), Value::from(self.trigger_time.unwrap_or(0.0)));
        Value::Map(map)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcknowledgementType {
    Normal,
    Sticky,
}

impl AcknowledgementType {
    pub fn from_sticky(sticky: bool) -> Self {
        if sticky {
            AcknowledgementType::Sticky
        } else {
            AcknowledgementType::Normal
        }
    }

    pub fn as_number(&self) -> i64 {
        match self {
            AcknowledgementType::Normal => 1,
            AcknowledgementType::Sticky => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Acknowledgement {
    pub author: String,
    pub comment: String,
    pub kind: AcknowledgementType,
    pub notify: bool,
    /// 0 = no expiry
    pub expiry: f64,
}
