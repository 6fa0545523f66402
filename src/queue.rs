//! Bounded multi-producer, single-consumer work queue.
//!
//! [`channel`] splits a `crossbeam-channel` bounded queue into a cloneable
//! [`QueueProducer`] and a single [`QueueConsumer`]. Producers apply the
//! configured [`OverflowPolicy`] when the queue is full and always report a
//! rejected item to the caller; the consumer waits with a timeout and wakes
//! early when its cancellation signal trips.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded, select};
use log::warn;
use thiserror::Error;

use crate::{
    cancel::CancelSignal,
    config::{OverflowPolicy, QueueConfig},
    item::WorkItem,
    rate_limited_warner::RateLimitedWarner,
};

/// Reasons an item was not enqueued.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue stayed full for as long as the overflow policy allows.
    #[error("queue full; item rejected")]
    Full,
    /// The consumer has gone away.
    #[error("queue closed; item rejected")]
    Closed,
}

/// Result of a single bounded wait on the queue.
#[derive(Debug, PartialEq)]
pub enum Dequeued {
    Item(WorkItem),
    /// Nothing arrived within the timeout.
    Empty,
    /// The cancellation signal tripped while waiting.
    Cancelled,
    /// Every producer is gone and the queue is drained.
    Disconnected,
}

/// Create a queue sized and policed according to `config`.
pub fn channel(config: &QueueConfig) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = bounded(config.capacity);
    let producer = QueueProducer {
        tx,
        policy: config.overflow_policy,
        rejections: Arc::new(Rejections(RateLimitedWarner::new(config.warn_interval))),
    };
    (producer, QueueConsumer { rx })
}

/// Sending half. Clone freely; every clone feeds the same consumer.
#[derive(Clone)]
pub struct QueueProducer {
    tx: Sender<WorkItem>,
    policy: OverflowPolicy,
    rejections: Arc<Rejections>,
}

/// Rejection counter shared by every clone of a producer. Reports whatever
/// is still pending when the last clone goes away.
struct Rejections(RateLimitedWarner);

impl Rejections {
    fn record(&self, err: EnqueueError) {
        self.0.record_drop();
        self.0.warn_if_due(|count| {
            warn!("logship: {err}; rejected {count} items");
        });
    }

    fn flush(&self) {
        self.0.flush(|count| {
            warn!("logship: rejected {count} items in the last interval");
        });
    }
}

impl Drop for Rejections {
    fn drop(&mut self) {
        self.flush();
    }
}

impl QueueProducer {
    /// Append `item` to the queue, honouring the overflow policy.
    pub fn enqueue(&self, item: WorkItem) -> Result<(), EnqueueError> {
        let result = match self.policy {
            OverflowPolicy::Drop => self.tx.try_send(item).map_err(|err| match err {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Disconnected(_) => EnqueueError::Closed,
            }),
            OverflowPolicy::Block => self.tx.send(item).map_err(|_| EnqueueError::Closed),
            OverflowPolicy::Timeout(timeout) => {
                self.tx.send_timeout(item, timeout).map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => EnqueueError::Full,
                    SendTimeoutError::Disconnected(_) => EnqueueError::Closed,
                })
            }
        };
        if let Err(err) = result {
            self.rejections.record(err);
        }
        result
    }

    /// Items currently waiting.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Emit any pending rejection warning now.
    pub fn flush_warnings(&self) {
        self.rejections.flush();
    }

    /// Rejections counted but not yet reported.
    pub fn pending_rejections(&self) -> u64 {
        self.rejections.0.pending()
    }
}

/// Receiving half, owned by exactly one worker.
pub struct QueueConsumer {
    rx: Receiver<WorkItem>,
}

impl QueueConsumer {
    /// Wait up to `timeout` for the next item.
    pub fn dequeue(&self, timeout: Duration, cancel: &CancelSignal) -> Dequeued {
        if cancel.is_cancelled() {
            return Dequeued::Cancelled;
        }
        select! {
            recv(self.rx) -> msg => match msg {
                Ok(item) => Dequeued::Item(item),
                Err(_) => Dequeued::Disconnected,
            },
            recv(cancel.receiver()) -> _ => Dequeued::Cancelled,
            default(timeout) => Dequeued::Empty,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
