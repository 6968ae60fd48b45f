//! Producer-side event queue with bounded capacity and explicit overflow policy
//!
//! Producers hand items to the sink's flusher thread through a bounded
//! channel. What happens when the channel is full is an explicit, per-sink
//! policy rather than unbounded blocking.

use crate::core::metrics::SinkMetrics;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of a sink's event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Policy for handling a full event queue
///
/// # Example
///
/// ```
/// use fanlog::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: count and drop the newest item
/// let policy = OverflowPolicy::default();
///
/// // Wait for space, but never longer than 50ms
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Default)]
pub enum OverflowPolicy {
    /// Drop the incoming item; counted in metrics and warned to stderr
    /// on the first drop and every 1000th thereafter.
    #[default]
    DropNewest,

    /// Block the producer until space is available.
    ///
    /// This restores the original hand-off semantics: a stalled flusher
    /// stalls its producers.
    Block,

    /// Block with a caller-visible timeout, then drop
    BlockWithTimeout(Duration),
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}

/// Sending half of a sink's event queue
///
/// Cheap to clone; every registered callback for the sink holds one.
pub struct EventQueue<T> {
    name: String,
    sender: Sender<T>,
    policy: OverflowPolicy,
    metrics: Arc<SinkMetrics>,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
            policy: self.policy.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T: Send> EventQueue<T> {
    /// Create a bounded queue, returning the producer handle and the
    /// receiver for the flusher thread.
    pub fn bounded(
        name: impl Into<String>,
        capacity: usize,
        policy: OverflowPolicy,
        metrics: Arc<SinkMetrics>,
    ) -> (Self, Receiver<T>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                name: name.into(),
                sender,
                policy,
                metrics,
            },
            receiver,
        )
    }

    /// Offer an item to the queue.
    ///
    /// Never returns an error: overflow is handled by the configured policy
    /// and a disconnected queue (sink already shut down) counts the item as
    /// dropped. Either way the outcome is visible in the sink's metrics.
    pub fn enqueue(&self, item: T) {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.metrics.record_enqueued();
            }
            Err(TrySendError::Full(item)) => {
                self.handle_overflow(item);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Sink stopped; post-shutdown events are rejected, not requeued
                self.metrics.record_dropped();
            }
        }
    }

    fn handle_overflow(&self, item: T) {
        self.metrics.record_queue_full();

        match &self.policy {
            OverflowPolicy::DropNewest => {
                self.alert_and_drop();
            }

            OverflowPolicy::Block => {
                self.metrics.record_block();
                match self.sender.send(item) {
                    Ok(()) => {
                        self.metrics.record_enqueued();
                    }
                    Err(_) => {
                        self.metrics.record_dropped();
                    }
                }
            }

            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match self.sender.send_timeout(item, *timeout) {
                    Ok(()) => {
                        self.metrics.record_enqueued();
                    }
                    Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => {
                        self.alert_and_drop();
                    }
                    Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                        self.metrics.record_dropped();
                    }
                }
            }
        }
    }

    fn alert_and_drop(&self) {
        let dropped_count = self.metrics.record_dropped();

        // Alert on the first drop and periodically thereafter
        let should_alert = dropped_count == 0 || (dropped_count + 1) % 1000 == 0;
        if should_alert {
            eprintln!(
                "[FANLOG WARNING] {} queue full, {} events dropped. \
                 Consider a larger queue or a blocking overflow policy.",
                self.name,
                dropped_count + 1
            );
        }
    }
}
