//! The seam between the worker and whatever ships a batch.
//!
//! The worker only depends on the [`Transport`] trait. Recoverable delivery
//! failures are reported as [`TransportError`] and drive the reconnect and
//! backoff cycle; failures tied to the item itself are reported as
//! [`FatalItemError`] and stop the worker.

mod serialise;
mod socket;

use std::io;

use thiserror::Error;

use crate::item::{Batch, Options};

pub use serialise::{FramedBatch, frame_payload, serialise_batch};
pub use socket::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE, DEFAULT_WRITE_TIMEOUT, Endpoint,
    SocketConfig, SocketTransport,
};

/// Liveness of a transport as seen by the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Valid,
    Invalid,
}

/// Recoverable delivery failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("transport is not connected")]
    NotConnected,
    #[error("serialisation failed: {0}")]
    Serialise(String),
}

/// Failure caused by the item rather than the connection. Never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FatalItemError {
    #[error("addglob item has an empty pattern")]
    EmptyPattern,
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },
    #[error("item rejected by transport: {0}")]
    Rejected(String),
}

/// Error returned by [`Transport::callback`].
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Fatal(#[from] FatalItemError),
}

/// Pluggable sink driven by the worker.
///
/// Implementations are moved onto the worker thread and only ever called
/// from there, so they need `Send` but not `Sync`.
pub trait Transport: Send {
    /// Whether the transport can currently accept batches.
    fn valid(&self) -> bool;

    /// Deliver one non-empty batch.
    fn callback(&mut self, batch: &Batch) -> Result<(), CallbackError>;

    /// Drop any connection state ahead of a reconnect.
    fn invalidate(&mut self);

    /// Try to re-establish the connection. Success is observed via
    /// [`valid`](Transport::valid).
    fn reconnect(&mut self);

    /// The worker is stopping because of an external interrupt.
    fn interrupt(&mut self);

    /// A new watch pattern was registered.
    fn add_glob(&mut self, _pattern: &str, _options: &Options) {}

    /// Liveness checked by the worker before each dequeue and after each
    /// reconnect. Defaults to [`valid`](Transport::valid).
    fn state(&self) -> TransportState {
        if self.valid() {
            TransportState::Valid
        } else {
            TransportState::Invalid
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn callback(&mut self, batch: &Batch) -> Result<(), CallbackError> {
        (**self).callback(batch)
    }

    fn invalidate(&mut self) {
        (**self).invalidate()
    }

    fn reconnect(&mut self) {
        (**self).reconnect()
    }

    fn interrupt(&mut self) {
        (**self).interrupt()
    }

    fn add_glob(&mut self, pattern: &str, options: &Options) {
        (**self).add_glob(pattern, options)
    }

    fn state(&self) -> TransportState {
        (**self).state()
    }
}
