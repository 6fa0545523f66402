//! Bounded log-shipping work queue.
//!
//! Producers push [`WorkItem`]s onto a bounded queue; a single [`Worker`]
//! drains it on its own thread, hands callback batches to a pluggable
//! [`Transport`], and retries transport failures with exponential backoff.
//! [`QueueRunner`] wires the pieces together.

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod item;
pub mod queue;
pub mod rate_limited_warner;
pub mod runner;
pub mod transport;
pub mod watch;
pub mod worker;

#[cfg(test)]
mod test_utils;

pub use backoff::BackoffState;
pub use cancel::{CancelSignal, CancellationToken, SleepOutcome};
pub use config::{
    ConfigError, FileConfig, OverflowPolicy, QueueConfig, load_ini_file, parse_policy_string,
};
pub use item::{Batch, Options, WorkItem};
pub use queue::{Dequeued, EnqueueError, QueueConsumer, QueueProducer, channel};
pub use runner::{QueueRunner, RunnerBuilder};
pub use transport::{
    CallbackError, Endpoint, FatalItemError, SocketConfig, SocketTransport, Transport,
    TransportError, TransportState,
};
pub use watch::WatchConfig;
pub use worker::{Sleeper, Worker, WorkerExit, WorkerState};
