use super::*;
use std::sync::{Arc, Mutex};

/// Collects every signal for inspection
#[derive(Default)]
struct RecordingSink {
    signals: Mutex<Vec<DomainSignal>>,
}

impl SignalSink for RecordingSink {
    fn on_signal(&self, signal: &DomainSignal) {
        self.signals.lock().unwrap().push(signal.clone());
    }
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .map(|s| match s {
                DomainSignal::NewCheckResult { .. } => "NewCheckResult",
                DomainSignal::StateChange { .. } => "StateChange",
                DomainSignal::AcknowledgementSet { .. } => "AcknowledgementSet",
                DomainSignal::AcknowledgementCleared { .. } => "AcknowledgementCleared",
                DomainSignal::CommentAdded { .. } => "CommentAdded",
                DomainSignal::CommentRemoved { .. } => "CommentRemoved",
                DomainSignal::DowntimeAdded { .. } => "DowntimeAdded",
                DomainSignal::DowntimeRemoved { .. } => "DowntimeRemoved",
                DomainSignal::DowntimeTriggered { .. } => "DowntimeTriggered",
                DomainSignal::NotificationsRequested { .. } => "NotificationsRequested",
            })
            .collect()
    }

    fn clear(&self) {
        self.signals.lock().unwrap().clear();
    }
}

fn store_with_sink() -> (ObjectStore, Arc<RecordingSink>) {
    let bus = Arc::new(SignalBus::new());
    let sink = Arc::new(RecordingSink::default());
    bus.subscribe(sink.clone());
    (ObjectStore::new(bus), sink)
}

fn service_result(state: ServiceState) -> CheckResult {
    CheckResult {
        output: "output".to_string(),
        state: CheckState::Service(state),
        performance_data: Value::Null,
        command: Value::Null,
        execution_start: 0.0,
        execution_end: 0.0,
        schedule_start: 0.0,
        schedule_end: 0.0,
        check_source: "test".to_string(),
    }
}

#[test]
fn test_lookup_by_kind_and_name() {
    let (store, _) = store_with_sink();
    store.add_host("web-01");
    store.add_service("web-01", "http");

    assert!(store.get(CheckableKind::Host, "web-01").is_some());
    assert!(store.get(CheckableKind::Service, "web-01!http").is_some());
    assert!(store.get(CheckableKind::Service, "web-01").is_none());
    assert_eq!(store.len(), 2);
}

#[test]
fn test_check_result_signals_state_change_only_on_change() {
    let (store, sink) = store_with_sink();
    let svc = store.add_service("web-01", "http");

    store
        .process_check_result(&svc, service_result(ServiceState::Ok))
        .unwrap();
    assert_eq!(sink.names(), vec!["NewCheckResult"]);

    sink.clear();
    store
        .process_check_result(&svc, service_result(ServiceState::Critical))
        .unwrap();
    assert_eq!(sink.names(), vec!["NewCheckResult", "StateChange"]);

    let snapshot = svc.snapshot().unwrap();
    assert_eq!(snapshot.state, CheckState::Service(ServiceState::Critical));
    assert_eq!(snapshot.state_type, StateType::Soft);
}

#[test]
fn test_soft_state_hardens_after_max_attempts() {
    let (store, _) = store_with_sink();
    let svc = store.add_service("db-01", "pgsql");

    for _ in 0..3 {
        store
            .process_check_result(&svc, service_result(ServiceState::Critical))
            .unwrap();
    }

    let snapshot = svc.snapshot().unwrap();
    assert_eq!(snapshot.check_attempt, 3);
    assert_eq!(snapshot.state_type, StateType::Hard);
}

#[test]
fn test_normal_ack_cleared_on_state_change_sticky_kept() {
    let (store, sink) = store_with_sink();
    let svc = store.add_service("web-01", "http");
    store
        .process_check_result(&svc, service_result(ServiceState::Critical))
        .unwrap();

    let ack = Acknowledgement {
        author: "alice".to_string(),
        comment: "looking".to_string(),
        kind: AcknowledgementType::Sticky,
        notify: false,
        expiry: 0.0,
    };
    store.acknowledge_problem(&svc, ack.clone()).unwrap();

    // Sticky ack survives a problem-to-problem change
    store
        .process_check_result(&svc, service_result(ServiceState::Warning))
        .unwrap();
    assert!(svc.snapshot().unwrap().acknowledgement.is_some());

    let normal = Acknowledgement {
        kind: AcknowledgementType::Normal,
        ..ack
    };
    store.acknowledge_problem(&svc, normal).unwrap();
    sink.clear();
    store
        .process_check_result(&svc, service_result(ServiceState::Critical))
        .unwrap();
    assert!(svc.snapshot().unwrap().acknowledgement.is_none());
    assert!(sink.names().contains(&"AcknowledgementCleared"));
}

#[test]
fn test_comment_legacy_ids_are_monotonic_and_resolvable() {
    let (store, sink) = store_with_sink();
    let host = store.add_host("web-01");

    let first = store
        .add_comment(&host, CommentType::User, "alice", "one", 0.0)
        .unwrap();
    let second = store
        .add_comment(&host, CommentType::User, "alice", "two", 0.0)
        .unwrap();
    assert!(second.legacy_id > first.legacy_id);
    assert_eq!(
        store.comment_id_from_legacy(first.legacy_id),
        Some(first.id.clone())
    );

    let removed = store.remove_comment(&first.id).unwrap();
    assert_eq!(removed.map(|c| c.legacy_id), Some(first.legacy_id));
    assert_eq!(store.comment_id_from_legacy(first.legacy_id), None);
    assert!(store.remove_comment(&first.id).unwrap().is_none());

    assert_eq!(
        sink.names(),
        vec!["CommentAdded", "CommentAdded", "CommentRemoved"]
    );
}

#[test]
fn test_remove_comments_by_type() {
    let (store, _) = store_with_sink();
    let host = store.add_host("web-01");
    store
        .add_comment(&host, CommentType::User, "alice", "note", 0.0)
        .unwrap();
    store
        .add_comment(&host, CommentType::Acknowledgement, "alice", "ack", 0.0)
        .unwrap();

    let removed = store
        .remove_comments_by_type(&host, CommentType::Acknowledgement)
        .unwrap();
    assert_eq!(removed, 1);

    let snapshot = host.snapshot().unwrap();
    assert_eq!(snapshot.comments.len(), 1);
    assert!(snapshot
        .comments
        .values()
        .all(|c| c.entry_type == CommentType::User));
}

#[test]
fn test_fixed_downtime_in_window_triggers_chain() {
    let (store, sink) = store_with_sink();
    let host = store.add_host("web-01");
    let svc = store.add_service("web-01", "http");
    let current = now();

    // Child first, waiting on a parent that is scheduled for later
    let parent = store
        .add_downtime(
            &host,
            DowntimeRequest {
                author: "alice".to_string(),
                comment: "maintenance".to_string(),
                start_time: current + 3600.0,
                end_time: current + 7200.0,
                duration: 3600.0,
                fixed: true,
                triggered_by: None,
            },
        )
        .unwrap();
    let child = store
        .add_downtime(
            &svc,
            DowntimeRequest {
                author: "alice".to_string(),
                comment: "follows host".to_string(),
                start_time: current,
                end_time: current + 7200.0,
                duration: 3600.0,
                fixed: false,
                triggered_by: Some(parent.id.clone()),
            },
        )
        .unwrap();
    assert!(!store.downtime(&child.id).unwrap().unwrap().is_triggered());

    sink.clear();
    assert_eq!(store.trigger_downtime(&parent.id).unwrap(), 2);
    assert!(store.downtime(&child.id).unwrap().unwrap().is_triggered());
    assert_eq!(sink.names(), vec!["DowntimeTriggered", "DowntimeTriggered"]);

    // Triggering again is a no-op
    assert_eq!(store.trigger_downtime(&parent.id).unwrap(), 0);
}

#[test]
fn test_fixed_downtime_triggers_immediately_when_window_open() {
    let (store, _) = store_with_sink();
    let host = store.add_host("web-01");
    let current = now();

    let downtime = store
        .add_downtime(
            &host,
            DowntimeRequest {
                author: "alice".to_string(),
                comment: "now".to_string(),
                start_time: current - 10.0,
                end_time: current + 3600.0,
                duration: 3600.0,
                fixed: true,
                triggered_by: None,
            },
        )
        .unwrap();

    assert!(store.downtime(&downtime.id).unwrap().unwrap().is_triggered());
}

#[test]
fn test_remove_all_downtimes_clears_indexes() {
    let (store, _) = store_with_sink();
    let host = store.add_host("web-01");
    let request = DowntimeRequest {
        author: "alice".to_string(),
        comment: "x".to_string(),
        start_time: 0.0,
        end_time: 1.0,
        duration: 1.0,
        ..Default::default()
    };
    let a = store.add_downtime(&host, request.clone()).unwrap();
    let b = store.add_downtime(&host, request).unwrap();

    assert_eq!(store.remove_all_downtimes(&host).unwrap(), 2);
    assert!(store.downtime_id_from_legacy(a.legacy_id).is_none());
    assert!(store.downtime_id_from_legacy(b.legacy_id).is_none());
    assert!(host.snapshot().unwrap().downtimes.is_empty());
}

#[test]
fn test_exit_status_mapping() {
    assert_eq!(ServiceState::from_exit_status(0), ServiceState::Ok);
    assert_eq!(ServiceState::from_exit_status(1), ServiceState::Warning);
    assert_eq!(ServiceState::from_exit_status(2), ServiceState::Critical);
    assert_eq!(ServiceState::from_exit_status(3), ServiceState::Unknown);
    assert_eq!(ServiceState::from_exit_status(-1), ServiceState::Unknown);
}

#[test]
fn test_checkable_ref_names() {
    assert_eq!(CheckableRef::host("web-01").name(), "web-01");
    assert_eq!(CheckableRef::service("web-01", "http").name(), "web-01!http");
    assert_eq!(CheckableKind::parse("service"), Some(CheckableKind::Service));
    assert_eq!(CheckableKind::parse("Zone"), None);
}

/// Panics on every signal
struct PanickingSink;

impl SignalSink for PanickingSink {
    fn on_signal(&self, _signal: &DomainSignal) {
        panic!("sink failure");
    }
}

#[test]
fn test_panicking_sink_does_not_starve_later_sinks() {
    let bus = Arc::new(SignalBus::new());
    let sink = Arc::new(RecordingSink::default());
    bus.subscribe(Arc::new(PanickingSink));
    bus.subscribe(sink.clone());
    let store = ObjectStore::new(bus);
    let svc = store.add_service("web-01", "http");

    let applied = store.process_check_result(&svc, service_result(ServiceState::Critical));

    assert!(applied.is_ok());
    assert!(svc.snapshot().unwrap().last_check_result.is_some());
    assert_eq!(sink.names(), vec!["NewCheckResult", "StateChange"]);
}

#[test]
fn test_acknowledge_refused_when_not_a_problem() {
    let (store, sink) = store_with_sink();
    let svc = store.add_service("web-01", "http");

    let ack = Acknowledgement {
        author: "alice".to_string(),
        comment: "looking".to_string(),
        kind: AcknowledgementType::Normal,
        notify: false,
        expiry: 0.0,
    };
    let outcome = store.acknowledge_problem(&svc, ack.clone()).unwrap();
    assert_eq!(
        outcome,
        AckOutcome::NotAProblem(CheckState::Service(ServiceState::Ok))
    );
    let snapshot = svc.snapshot().unwrap();
    assert!(snapshot.acknowledgement.is_none());
    assert!(snapshot.comments.is_empty());
    assert!(sink.names().is_empty());

    store
        .process_check_result(&svc, service_result(ServiceState::Critical))
        .unwrap();
    sink.clear();
    let AckOutcome::Acknowledged(comment) = store.acknowledge_problem(&svc, ack).unwrap() else {
        panic!("problem was not acknowledged");
    };
    assert_eq!(comment.entry_type, CommentType::Acknowledgement);
    assert_eq!(
        store.comment_id_from_legacy(comment.legacy_id),
        Some(comment.id.clone())
    );
    assert_eq!(sink.names(), vec!["CommentAdded", "AcknowledgementSet"]);
}

/// A recovery racing an acknowledgement never leaves a recovered object
/// acknowledged.
#[test]
fn test_acknowledge_racing_recovery_never_acks_ok_object() {
    let (store, _sink) = store_with_sink();
    let store = Arc::new(store);

    for _ in 0..200 {
        let svc = store.add_service("web-01", "http");
        store
            .process_check_result(&svc, service_result(ServiceState::Critical))
            .unwrap();

        let acker = {
            let store = Arc::clone(&store);
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || {
                store
                    .acknowledge_problem(
                        &svc,
                        Acknowledgement {
                            author: "alice".to_string(),
                            comment: "looking".to_string(),
                            kind: AcknowledgementType::Normal,
                            notify: false,
                            expiry: 0.0,
                        },
                    )
                    .unwrap()
            })
        };
        store
            .process_check_result(&svc, service_result(ServiceState::Ok))
            .unwrap();
        acker.join().unwrap();

        let snapshot = svc.snapshot().unwrap();
        assert_eq!(snapshot.state, CheckState::Service(ServiceState::Ok));
        assert!(snapshot.acknowledgement.is_none());
    }
}
