// Named event queues and their subscribers.

mod filter;
mod queue;
mod registry;
mod subscriber;

pub use filter::EventFilter;
pub use queue::{EventQueue, QueueConfig};
pub use registry::{EventQueueRegistry, QueueStats, RegistryOptions, Subscription};
pub use subscriber::{Subscriber, SubscriberHandle};

use serde::{Deserialize, Serialize};
use std::fmt;


/// What happens when a subscriber's buffer is full
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest pending event
    #[default]
    DropOldest,
    /// Close the subscriber; its stream ends
    Disconnect,
}

/// How a subscribe call treats an existing queue of the same name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconfigurePolicy {
    /// Last writer wins
    #[default]
    Replace,
    /// Identical configuration is a no-op; a different one fails while
    /// subscribers are attached
    RejectConflicting,
}

/// Subscribe errors
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeError {
    EmptyQueueName,
    NoEventTypes,
    /// Queue exists with a different configuration and live subscribers
    Conflict(String),
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::EmptyQueueName => write!(f, "queue name must not be empty"),
            SubscribeError::NoEventTypes => write!(f, "at least one event type is required"),
            SubscribeError::Conflict(name) => write!(
                f,
                "queue '{}' is already configured differently by another subscriber",
                name
            ),
        }
    }
}

impl std::error::Error for SubscribeError {}

/// Reasons a wait ends without an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The caller's cancel future fired
    Cancelled,
    /// The subscriber was closed (overflow or shutdown) and its buffer drained
    Disconnected,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Cancelled => write!(f, "wait cancelled"),
            WaitError::Disconnected => write!(f, "subscriber disconnected"),
        }
    }
}

impl std::error::Error for WaitError {}
