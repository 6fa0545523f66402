//! Cooperative cancellation shared between a controller and the worker.
//!
//! A [`CancellationToken`] owns the sending half of a zero-capacity channel.
//! Cancelling drops that sender, which disconnects every [`CancelSignal`]
//! receiver at once. Blocking points in the worker wait on the signal with a
//! timeout, so a cancellation is observed as soon as it happens rather than
//! after the current wait expires.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;

/// Outcome of a cancellable sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed.
    Elapsed,
    /// The token was cancelled before the duration elapsed.
    Cancelled,
}

struct Inner {
    sender: Mutex<Option<Sender<()>>>,
    cancelled: AtomicBool,
}

/// Controller side of the cancellation pair.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
    rx: Receiver<()>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                cancelled: AtomicBool::new(false),
            }),
            rx,
        }
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.sender.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Return a signal that observes this token.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            inner: Arc::clone(&self.inner),
            rx: self.rx.clone(),
        }
    }
}

/// Observer side handed to blocking code.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
    rx: Receiver<()>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` unless the token is cancelled first.
    pub fn sleep(&self, duration: Duration) -> SleepOutcome {
        if self.is_cancelled() {
            return SleepOutcome::Cancelled;
        }
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => SleepOutcome::Elapsed,
            // Nothing is ever sent, so any wake-up before the timeout is the
            // sender being dropped.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => SleepOutcome::Cancelled,
        }
    }

    /// Receiver that disconnects on cancellation, for use in `select!`.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
