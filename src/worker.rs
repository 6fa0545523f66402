//! The queue-draining state machine.
//!
//! A [`Worker`] owns the single consumer half of the queue and the transport.
//! It moves between three states:
//!
//! - `Running`: dequeue with a bounded wait and dispatch each item.
//! - `AwaitingReconnect`: after a recoverable delivery failure, sleep with
//!   exponential backoff, invalidate and reconnect the transport, then
//!   redeliver the held batch once the transport is valid again.
//! - `Terminated`: final; [`Worker::run`] returns a [`WorkerExit`].
//!
//! The worker blocks only while dequeuing and while sleeping between retries.
//! Both waits observe the cancellation signal, and a cancellation at either
//! point notifies the transport through [`Transport::interrupt`] before the
//! loop returns.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::{
    backoff::BackoffState,
    cancel::{CancelSignal, SleepOutcome},
    config::QueueConfig,
    item::{Batch, Options, WorkItem},
    queue::{Dequeued, QueueConsumer},
    transport::{CallbackError, FatalItemError, Transport, TransportState},
    watch::WatchConfig,
};

/// Pause used between reconnect attempts.
///
/// The default waits on the cancellation signal. Replacing it lets callers
/// observe or shorten backoff delays.
pub type Sleeper = Box<dyn FnMut(Duration, &CancelSignal) -> SleepOutcome + Send>;

/// Position of the worker in its state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    AwaitingReconnect,
    Terminated,
}

/// Why the worker stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// An `Exit` item was dequeued.
    Exit,
    /// No item arrived for longer than `queue_timeout`.
    IdleTimeout,
    /// The transport reported itself invalid outside of a retry cycle.
    TransportInvalid,
    /// The cancellation signal tripped at a blocking point.
    Cancelled,
    /// Every producer was dropped and the queue drained.
    QueueClosed,
    /// A malformed item or a non-recoverable delivery failure.
    Fatal(FatalItemError),
}

fn default_sleeper() -> Sleeper {
    Box::new(|delay, cancel| cancel.sleep(delay))
}

/// Single consumer driving a [`Transport`].
pub struct Worker<T: Transport> {
    config: QueueConfig,
    consumer: QueueConsumer,
    transport: T,
    watch: WatchConfig,
    cancel: CancelSignal,
    backoff: BackoffState,
    sleeper: Sleeper,
    state: WorkerState,
    exit: Option<WorkerExit>,
}

impl<T: Transport> Worker<T> {
    pub fn new(
        config: QueueConfig,
        consumer: QueueConsumer,
        transport: T,
        watch: WatchConfig,
        cancel: CancelSignal,
    ) -> Self {
        let backoff = BackoffState::from_config(&config);
        Self {
            config,
            consumer,
            transport,
            watch,
            cancel,
            backoff,
            sleeper: default_sleeper(),
            state: WorkerState::Running,
            exit: None,
        }
    }

    /// Replace the pause used between reconnect attempts.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Current value of the failure counter.
    pub fn failures(&self) -> u32 {
        self.backoff.failures()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Drain the queue until the worker terminates.
    ///
    /// A worker that has already terminated returns the reason it stopped
    /// the first time, without touching the queue or the transport.
    pub fn run(&mut self) -> WorkerExit {
        if let Some(exit) = &self.exit {
            return exit.clone();
        }
        let exit = self.drive();
        self.state = WorkerState::Terminated;
        self.exit = Some(exit.clone());
        info!("logship: worker terminated ({exit:?})");
        exit
    }

    /// Why the worker stopped, once it has.
    pub fn exit_reason(&self) -> Option<&WorkerExit> {
        self.exit.as_ref()
    }

    fn drive(&mut self) -> WorkerExit {
        let mut last_activity = Instant::now();
        loop {
            if self.transport.state() == TransportState::Invalid {
                warn!("logship: transport became invalid; stopping worker");
                return WorkerExit::TransportInvalid;
            }
            match self.consumer.dequeue(self.config.wait_timeout, &self.cancel) {
                Dequeued::Item(item) => {
                    last_activity = Instant::now();
                    if let Some(exit) = self.handle_item(item) {
                        return exit;
                    }
                }
                Dequeued::Empty => {
                    if last_activity.elapsed() >= self.config.queue_timeout {
                        info!(
                            "logship: queue idle for {:?}; stopping worker",
                            self.config.queue_timeout
                        );
                        return WorkerExit::IdleTimeout;
                    }
                }
                Dequeued::Cancelled => {
                    self.transport.interrupt();
                    return WorkerExit::Cancelled;
                }
                Dequeued::Disconnected => return WorkerExit::QueueClosed,
            }
        }
    }

    fn handle_item(&mut self, item: WorkItem) -> Option<WorkerExit> {
        debug!("logship: processing {} item", item.kind());
        match item {
            WorkItem::Callback { lines, options } => {
                let batch = Batch::new(lines, options, self.config.ignore_empty);
                if batch.is_empty() {
                    debug!("logship: skipping empty batch");
                    return None;
                }
                self.deliver(&batch)
            }
            WorkItem::AddGlob { pattern, options } => self.add_glob(pattern, options),
            WorkItem::Exit => Some(WorkerExit::Exit),
        }
    }

    fn add_glob(&mut self, pattern: String, options: Options) -> Option<WorkerExit> {
        if pattern.trim().is_empty() {
            let err = FatalItemError::EmptyPattern;
            error!("logship: malformed item: {err}");
            return Some(WorkerExit::Fatal(err));
        }
        self.transport.add_glob(&pattern, &options);
        self.watch.add(pattern, options);
        None
    }

    fn deliver(&mut self, batch: &Batch) -> Option<WorkerExit> {
        loop {
            match self.transport.callback(batch) {
                Ok(()) => {
                    self.backoff.reset();
                    return None;
                }
                Err(CallbackError::Fatal(err)) => {
                    error!("logship: dropping batch of {} lines: {err}", batch.len());
                    return Some(WorkerExit::Fatal(err));
                }
                Err(CallbackError::Transport(err)) => {
                    warn!("logship: transport failure: {err}");
                    self.state = WorkerState::AwaitingReconnect;
                    if let Some(exit) = self.await_reconnect() {
                        return Some(exit);
                    }
                    self.state = WorkerState::Running;
                }
            }
        }
    }

    fn await_reconnect(&mut self) -> Option<WorkerExit> {
        loop {
            let delay = self.backoff.next_sleep();
            warn!(
                "logship: reconnecting in {delay:?} (failure {})",
                self.backoff.failures()
            );
            if (self.sleeper)(delay, &self.cancel) == SleepOutcome::Cancelled {
                self.transport.interrupt();
                return Some(WorkerExit::Cancelled);
            }
            self.transport.invalidate();
            self.transport.reconnect();
            if self.transport.state() == TransportState::Valid {
                self.backoff.reset();
                return None;
            }
        }
    }
}
