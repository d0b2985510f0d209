use super::{EventQueue, OverflowPolicy, WaitError};
use crate::event::Event;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::warn;

/// One attached connection: a bounded pending-event buffer plus its wakeup.
///
/// Publishers push under the buffer lock and call `notify_one`, which
/// stores a permit when nobody is waiting, so an event published between
/// the waiter's empty check and its suspension still wakes it.
pub struct Subscriber {
    id: u64,
    queue: String,
    buffer: Mutex<VecDeque<Arc<Event>>>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl Subscriber {
    pub(crate) fn new(id: u64, queue: &str, capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            id,
            queue: queue.to_string(),
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            overflow,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Enqueue and wake. Returns false if the event was not accepted.
    pub(crate) fn push(&self, event: Arc<Event>) -> bool {
        if self.is_closed() {
            return false;
        }

        {
            let mut buffer = match self.buffer.lock() {
                Ok(buffer) => buffer,
                Err(poisoned) => poisoned.into_inner(),
            };
            if buffer.len() >= self.capacity {
                match self.overflow {
                    OverflowPolicy::DropOldest => {
                        buffer.pop_front();
                        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            queue = %self.queue,
                            subscriber = self.id,
                            dropped = dropped,
                            "Subscriber buffer full, dropping oldest event"
                        );
                    }
                    OverflowPolicy::Disconnect => {
                        drop(buffer);
                        warn!(
                            queue = %self.queue,
                            subscriber = self.id,
                            "Subscriber buffer full, disconnecting"
                        );
                        self.close();
                        return false;
                    }
                }
            }
            buffer.push_back(event);
        }

        self.notify.notify_one();
        true
    }

    /// Stop accepting events and wake any waiter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Events discarded by the drop-oldest policy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Next buffered event without waiting
    pub fn try_next(&self) -> Option<Arc<Event>> {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    /// Suspend until an event is buffered or `cancel` completes.
    ///
    /// Events come out in publish order. A closed subscriber still drains
    /// what it buffered before reporting `Disconnected`.
    pub async fn wait_for_event<F>(&self, cancel: F) -> Result<Arc<Event>, WaitError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        loop {
            if let Some(event) = self.try_next() {
                return Ok(event);
            }
            if self.is_closed() {
                return Err(WaitError::Disconnected);
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = &mut cancel => return Err(WaitError::Cancelled),
            }
        }
    }
}

/// An attached subscriber together with the queue instance it joined.
#[derive(Clone)]
pub struct SubscriberHandle {
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) subscriber: Arc<Subscriber>,
}

impl SubscriberHandle {
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }
}
