use super::signal::DomainSignal;
use super::{
    Acknowledgement, CheckResult, CheckState, Comment, CommentType, Downtime, HostState,
    ServiceState, StateType,
};
use std::collections::BTreeMap;
use std::fmt;

/// Object type tag used for action applicability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckableKind {
    Host,
    Service,
}

impl CheckableKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            CheckableKind::Host => "Host",
            CheckableKind::Service => "Service",
        }
    }

    /// Case-insensitive parse of "Host" / "Service".
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("host") {
            Some(CheckableKind::Host)
        } else if name.eq_ignore_ascii_case("service") {
            Some(CheckableKind::Service)
        } else {
            None
        }
    }
}

impl fmt::Display for CheckableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Identity of a checkable as it appears in events.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CheckableRef {
    pub host: String,
    pub service: Option<String>,
}

impl CheckableRef {
    pub fn host(name: &str) -> Self {
        Self {
            host: name.to_string(),
            service: None,
        }
    }

    pub fn service(host: &str, service: &str) -> Self {
        Self {
            host: host.to_string(),
            service: Some(service.to_string()),
        }
    }

    pub fn kind(&self) -> CheckableKind {
        if self.service.is_some() {
            CheckableKind::Service
        } else {
            CheckableKind::Host
        }
    }

    /// Full object name: "host" or "host!service".
    pub fn name(&self) -> String {
        match &self.service {
            Some(service) => format!("{}!{}", self.host, service),
            None => self.host.clone(),
        }
    }
}

/// Mutable state of one monitored object.
///
/// Never shared directly; always accessed through the owning
/// [`ObjectHandle`](super::ObjectHandle)'s lock.
#[derive(Clone, Debug)]
pub struct Checkable {
    pub reference: CheckableRef,
    pub enable_passive_checks: bool,
    /// Seconds between active checks
    pub check_interval: f64,
    pub max_check_attempts: u32,
    pub check_attempt: u32,
    pub state: CheckState,
    pub state_type: StateType,
    pub last_state_change: f64,
    pub last_check_result: Option<CheckResult>,
    pub next_check: f64,
    pub force_next_check: bool,
    pub force_next_notification: bool,
    pub next_notification: f64,
    pub acknowledgement: Option<Acknowledgement>,
    pub comments: BTreeMap<String, Comment>,
    pub downtimes: BTreeMap<String, Downtime>,
}

impl Checkable {
    pub fn new(reference: CheckableRef) -> Self {
        let state = match reference.kind() {
            CheckableKind::Host => CheckState::Host(HostState::Up),
            CheckableKind::Service => CheckState::Service(ServiceState::Ok),
        };
        Self {
            reference,
            enable_passive_checks: true,
            check_interval: 300.0,
            max_check_attempts: 3,
            check_attempt: 1,
            state,
            state_type: StateType::Hard,
            last_state_change: 0.0,
            last_check_result: None,
            next_check: 0.0,
            force_next_check: false,
            force_next_notification: false,
            next_notification: 0.0,
            acknowledgement: None,
            comments: BTreeMap::new(),
            downtimes: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> CheckableKind {
        self.reference.kind()
    }

    pub fn name(&self) -> String {
        self.reference.name()
    }

    /// Replace the last check result and advance the state machine.
    ///
    /// Returns the signals to emit once the object lock is released.
    pub fn apply_check_result(&mut self, cr: CheckResult, now: f64) -> Vec<DomainSignal> {
        let mut signals = Vec::new();
        let old_state = self.state;
        let old_type = self.state_type;
        let new_state = cr.state;

        if new_state.is_ok() {
            self.check_attempt = 1;
            self.state_type = StateType::Hard;
        } else if old_state.is_ok() || (old_state != new_state && old_type == StateType::Hard) {
            self.check_attempt = 1;
            self.state_type = if self.max_check_attempts <= 1 {
                StateType::Hard
            } else {
                StateType::Soft
            };
        } else if self.state_type == StateType::Soft {
            self.check_attempt += 1;
            if self.check_attempt >= self.max_check_attempts {
                self.state_type = StateType::Hard;
            }
        }

        let changed = old_state != new_state;
        self.state = new_state;
        if changed {
            self.last_state_change = now;
        }
        self.last_check_result = Some(cr.clone());

        signals.push(DomainSignal::NewCheckResult {
            checkable: self.reference.clone(),
            check_result: cr.clone(),
        });

        if changed || (old_type == StateType::Soft && self.state_type == StateType::Hard) {
            signals.push(DomainSignal::StateChange {
                checkable: self.reference.clone(),
                check_result: cr,
                state: new_state,
                state_type: self.state_type,
            });
        }

        if changed {
            let clear = match &self.acknowledgement {
                Some(ack) => ack.kind == super::AcknowledgementType::Normal || new_state.is_ok(),
                None => false,
            };
            if clear {
                self.acknowledgement = None;
                signals.push(DomainSignal::AcknowledgementCleared {
                    checkable: self.reference.clone(),
                });
            }
        }

        signals
    }

    pub fn comments_of_type(&self, entry_type: CommentType) -> Vec<String> {
        self.comments
            .values()
            .filter(|c| c.entry_type == entry_type)
            .map(|c| c.id.clone())
            .collect()
    }
}
