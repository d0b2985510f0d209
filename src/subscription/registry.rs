use super::{
    EventQueue, OverflowPolicy, QueueConfig, ReconfigurePolicy, SubscribeError, SubscriberHandle,
    WaitError,
};
use crate::event::{Event, EventPublisher, EventType};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Per-subscriber limits and queue policies
#[derive(Clone, Debug)]
pub struct RegistryOptions {
    pub subscriber_buffer: usize,
    pub overflow: OverflowPolicy,
    pub reconfigure: ReconfigurePolicy,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            subscriber_buffer: 1024,
            overflow: OverflowPolicy::DropOldest,
            reconfigure: ReconfigurePolicy::Replace,
        }
    }
}

/// Snapshot of one queue for the status endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct QueueStats {
    pub name: String,
    pub types: Vec<EventType>,
    pub subscribers: usize,
}

/// Name-keyed collection of event queues.
///
/// Membership changes go through DashMap entry guards: subscribe attaches
/// under the same shard lock that `detach` takes for its empty-check and
/// removal, so a queue is never removed while a new subscriber joins it.
pub struct EventQueueRegistry {
    queues: DashMap<String, Arc<EventQueue>>,
    options: RegistryOptions,
    next_subscriber: AtomicU64,
}

impl EventQueueRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            queues: DashMap::new(),
            options,
            next_subscriber: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Lookup-or-insert. Concurrent callers always get the same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<EventQueue> {
        let entry = self.queues.entry(name.to_string()).or_insert_with(|| {
            info!(queue = %name, "Event queue created");
            Arc::new(EventQueue::new(name, QueueConfig::default()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<EventQueue>> {
        self.queues.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Create or reuse `name`, apply `config` and attach a new subscriber.
    pub fn attach(
        &self,
        name: &str,
        config: QueueConfig,
    ) -> Result<SubscriberHandle, SubscribeError> {
        if name.is_empty() {
            return Err(SubscribeError::EmptyQueueName);
        }
        if config.types.is_empty() {
            return Err(SubscribeError::NoEventTypes);
        }

        let entry = self.queues.entry(name.to_string()).or_insert_with(|| {
            info!(queue = %name, "Event queue created");
            Arc::new(EventQueue::new(name, config.clone()))
        });
        let queue = Arc::clone(entry.value());
        queue.configure(config, self.options.reconfigure)?;

        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let subscriber = queue.attach(id, self.options.subscriber_buffer, self.options.overflow);
        drop(entry);

        info!(
            queue = %name,
            subscriber = id,
            subscribers = queue.subscriber_count(),
            "Subscriber attached"
        );
        Ok(SubscriberHandle { queue, subscriber })
    }

    /// Attach and wrap the handle in a guard that detaches on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        name: &str,
        config: QueueConfig,
    ) -> Result<Subscription, SubscribeError> {
        let handle = self.attach(name, config)?;
        Ok(Subscription {
            registry: Arc::clone(self),
            handle: Some(handle),
        })
    }

    /// Detach a subscriber and drop its queue if that left it unused.
    pub fn detach(&self, handle: &SubscriberHandle) {
        let queue = &handle.queue;
        let remaining = queue.detach(handle.subscriber.id());
        info!(
            queue = %queue.name(),
            subscriber = handle.subscriber.id(),
            subscribers = remaining,
            "Subscriber detached"
        );
        self.unregister_if_unused(queue);
    }

    /// Remove `queue` if it is still the registered instance, has no
    /// subscribers and no time-to-live keeping it around.
    pub fn unregister_if_unused(&self, queue: &Arc<EventQueue>) -> bool {
        let removed = self
            .queues
            .remove_if(queue.name(), |_, current| {
                Arc::ptr_eq(current, queue) && current.subscriber_count() == 0 && current.ttl() <= 0.0
            })
            .is_some();
        if removed {
            info!(queue = %queue.name(), "Event queue removed");
        }
        removed
    }

    /// Remove unused queues: those without a time-to-live right away, the
    /// rest once it has elapsed.
    pub fn reap_idle(&self, now: Instant) -> usize {
        let candidates: Vec<Arc<EventQueue>> = self
            .queues
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut reaped = 0;
        for queue in candidates {
            let removed = self
                .queues
                .remove_if(queue.name(), |_, current| {
                    let ttl = current.ttl();
                    Arc::ptr_eq(current, &queue)
                        && current.subscriber_count() == 0
                        && (ttl <= 0.0 || current.idle_for(now) >= Duration::from_secs_f64(ttl))
                })
                .is_some();
            if removed {
                info!(queue = %queue.name(), "Idle event queue expired");
                reaped += 1;
            }
        }
        reaped
    }

    /// Periodically run [`reap_idle`](Self::reap_idle) until the task is aborted.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = registry.reap_idle(Instant::now());
                if reaped > 0 {
                    debug!(reaped = reaped, "Reaper pass complete");
                }
            }
        })
    }

    /// Whether any queue with attached subscribers wants `event_type`
    pub fn has_queues_for(&self, event_type: EventType) -> bool {
        self.queues.iter().any(|entry| {
            let queue = entry.value();
            queue.subscribes_to(event_type) && queue.subscriber_count() > 0
        })
    }

    pub fn queues_for(&self, event_type: EventType) -> Vec<Arc<EventQueue>> {
        self.queues
            .iter()
            .filter(|entry| entry.value().subscribes_to(event_type))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Hand the event to every queue subscribed to its type.
    pub fn publish(&self, event: Arc<Event>) -> usize {
        self.queues_for(event.event_type())
            .iter()
            .map(|queue| queue.process_event(&event))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Per-queue summary, sorted by name
    pub fn stats(&self) -> Vec<QueueStats> {
        let mut stats: Vec<QueueStats> = self
            .queues
            .iter()
            .map(|entry| {
                let queue = entry.value();
                QueueStats {
                    name: queue.name().to_string(),
                    types: queue.config().types.into_iter().collect(),
                    subscribers: queue.subscriber_count(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

impl Default for EventQueueRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl EventPublisher for EventQueueRegistry {
    fn wants(&self, event_type: EventType) -> bool {
        self.has_queues_for(event_type)
    }

    fn publish(&self, event: Arc<Event>) -> usize {
        EventQueueRegistry::publish(self, event)
    }
}

/// Attached subscriber that detaches itself when dropped.
///
/// Streaming responses own one of these, so a client disconnect (which
/// drops the response body) always releases the subscriber and its queue.
pub struct Subscription {
    registry: Arc<EventQueueRegistry>,
    handle: Option<SubscriberHandle>,
}

impl Subscription {
    pub fn handle(&self) -> Option<&SubscriberHandle> {
        self.handle.as_ref()
    }

    pub fn queue_name(&self) -> &str {
        self.handle
            .as_ref()
            .map(|h| h.queue.name())
            .unwrap_or_default()
    }

    pub async fn next_event<F>(&self, cancel: F) -> Result<Arc<Event>, WaitError>
    where
        F: Future<Output = ()>,
    {
        match &self.handle {
            Some(handle) => handle.subscriber.wait_for_event(cancel).await,
            None => Err(WaitError::Disconnected),
        }
    }

    /// Detach now instead of on drop.
    pub fn detach(mut self) {
        if let Some(handle) = self.handle.take() {
            self.registry.detach(&handle);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.registry.detach(&handle);
        }
    }
}
