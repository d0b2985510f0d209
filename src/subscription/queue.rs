use super::{EventFilter, OverflowPolicy, ReconfigurePolicy, SubscribeError, Subscriber};
use crate::event::{Event, EventType};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Type set, predicate and time-to-live of a queue
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueConfig {
    pub types: BTreeSet<EventType>,
    pub filter: EventFilter,
    /// Seconds a queue may sit without subscribers; 0 = removed on last detach
    pub ttl: f64,
}

impl QueueConfig {
    pub fn new(types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Type and predicate check for one event
    pub fn accepts(&self, event: &Event) -> bool {
        self.types.contains(&event.event_type()) && self.filter.matches(event)
    }
}

/// A named queue. Configuration is shared by every subscriber; each
/// subscriber has its own buffer.
pub struct EventQueue {
    name: String,
    config: RwLock<QueueConfig>,
    subscribers: Mutex<HashMap<u64, Arc<Subscriber>>>,
    last_activity: Mutex<Instant>,
}

impl EventQueue {
    pub(crate) fn new(name: &str, config: QueueConfig) -> Self {
        Self {
            name: name.to_string(),
            config: RwLock::new(config),
            subscribers: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> QueueConfig {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn subscribes_to(&self, event_type: EventType) -> bool {
        match self.config.read() {
            Ok(config) => config.types.contains(&event_type),
            Err(poisoned) => poisoned.into_inner().types.contains(&event_type),
        }
    }

    pub fn ttl(&self) -> f64 {
        self.config().ttl
    }

    /// Apply a subscriber's configuration. Affects future deliveries only.
    pub(crate) fn configure(
        &self,
        config: QueueConfig,
        policy: ReconfigurePolicy,
    ) -> Result<(), SubscribeError> {
        let mut current = match self.config.write() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current == config {
            return Ok(());
        }
        if policy == ReconfigurePolicy::RejectConflicting && self.subscriber_count() > 0 {
            return Err(SubscribeError::Conflict(self.name.clone()));
        }
        info!(queue = %self.name, types = ?config.types, ttl = config.ttl, "Queue reconfigured");
        *current = config;
        Ok(())
    }

    pub(crate) fn attach(
        &self,
        id: u64,
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Arc<Subscriber> {
        let subscriber = Arc::new(Subscriber::new(id, &self.name, capacity, overflow));
        self.lock_subscribers()
            .insert(id, Arc::clone(&subscriber));
        self.touch();
        subscriber
    }

    /// Returns the number of subscribers left.
    pub(crate) fn detach(&self, id: u64) -> usize {
        let remaining = {
            let mut subscribers = self.lock_subscribers();
            if let Some(subscriber) = subscribers.remove(&id) {
                subscriber.close();
            }
            subscribers.len()
        };
        self.touch();
        remaining
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Deliver to every attached subscriber if the event passes the
    /// queue's filters. Returns the number of subscribers reached.
    pub(crate) fn process_event(&self, event: &Arc<Event>) -> usize {
        let accepted = match self.config.read() {
            Ok(config) => config.accepts(event),
            Err(poisoned) => poisoned.into_inner().accepts(event),
        };
        if !accepted {
            return 0;
        }

        let subscribers: Vec<Arc<Subscriber>> =
            self.lock_subscribers().values().cloned().collect();
        let delivered = subscribers
            .iter()
            .filter(|s| s.push(Arc::clone(event)))
            .count();
        if delivered > 0 {
            self.touch();
        }
        delivered
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        let last = match self.last_activity.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        };
        now.saturating_duration_since(last)
    }

    fn touch(&self) {
        match self.last_activity.lock() {
            Ok(mut last) => *last = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Subscriber>>> {
        match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
