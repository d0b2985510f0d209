use super::{
    AcknowledgementType, CheckResult, CheckState, CheckableRef, Comment, Downtime, StateType,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

/// Domain occurrence raised by the object store after a mutation.
#[derive(Clone, Debug)]
pub enum DomainSignal {
    NewCheckResult {
        checkable: CheckableRef,
        check_result: CheckResult,
    },
    StateChange {
        checkable: CheckableRef,
        check_result: CheckResult,
        state: CheckState,
        state_type: StateType,
    },
    AcknowledgementSet {
        checkable: CheckableRef,
        author: String,
        comment: String,
        kind: AcknowledgementType,
        notify: bool,
        expiry: f64,
    },
    AcknowledgementCleared {
        checkable: CheckableRef,
    },
    CommentAdded {
        checkable: CheckableRef,
        comment: Comment,
    },
    CommentRemoved {
        checkable: CheckableRef,
        comment: Comment,
    },
    DowntimeAdded {
        checkable: CheckableRef,
        downtime: Downtime,
    },
    DowntimeRemoved {
        checkable: CheckableRef,
        downtime: Downtime,
    },
    DowntimeTriggered {
        checkable: CheckableRef,
        downtime: Downtime,
    },
    /// Custom notification request, consumed by the notification engine.
    NotificationsRequested {
        checkable: CheckableRef,
        check_result: Option<CheckResult>,
        author: String,
        text: String,
        forced: bool,
    },
}

/// Receiver of domain signals.
///
/// Called synchronously on the mutating thread after the object lock is
/// released; implementations must not block. A panic is caught and logged
/// and does not reach later sinks or the caller.
pub trait SignalSink: Send + Sync {
    fn on_signal(&self, signal: &DomainSignal);
}

/// Typed fan-out point between the object store and its listeners.
///
/// Listeners subscribe once at startup.
#[derive(Default)]
pub struct SignalBus {
    sinks: RwLock<Vec<Arc<dyn SignalSink>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn SignalSink>) {
        match self.sinks.write() {
            Ok(mut sinks) => sinks.push(sink),
            Err(poisoned) => poisoned.into_inner().push(sink),
        }
    }

    pub fn emit(&self, signal: &DomainSignal) {
        let sinks = match self.sinks.read() {
            Ok(sinks) => sinks.clone(),
            Err(_) => {
                warn!("Signal bus lock poisoned, dropping signal");
                return;
            }
        };
        for sink in sinks {
            if panic::catch_unwind(AssertUnwindSafe(|| sink.on_signal(signal))).is_err() {
                error!(signal = ?signal, "Signal sink panicked");
            }
        }
    }

    pub fn emit_all(&self, signals: Vec<DomainSignal>) {
        for signal in &signals {
            self.emit(signal);
        }
    }
}
