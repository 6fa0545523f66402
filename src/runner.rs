//! Thread-owning handle around a [`Worker`].
//!
//! [`QueueRunner`] validates the configuration, builds the queue, and drives
//! the worker on a dedicated thread. Producers obtain cloneable
//! [`QueueProducer`] handles from it. Closing the runner enqueues an `Exit`
//! item so everything queued before it is still delivered; dropping the
//! runner cancels the worker instead and waits for it to stop.

use std::thread::{self, JoinHandle};

use log::warn;
use parking_lot::Mutex;

use crate::{
    cancel::CancellationToken,
    config::{ConfigError, QueueConfig},
    item::WorkItem,
    queue::{EnqueueError, QueueProducer, channel},
    transport::Transport,
    watch::WatchConfig,
    worker::{Sleeper, Worker, WorkerExit},
};

/// Builder for a [`QueueRunner`].
pub struct RunnerBuilder {
    config: QueueConfig,
    watch: Option<WatchConfig>,
    token: Option<CancellationToken>,
    sleeper: Option<Sleeper>,
}

impl RunnerBuilder {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            watch: None,
            token: None,
            sleeper: None,
        }
    }

    /// Share an existing watch set with the worker.
    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Observe an externally owned cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Replace the pause used between reconnect attempts.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate the configuration and start the worker thread.
    pub fn spawn<T>(self, transport: T) -> Result<QueueRunner, ConfigError>
    where
        T: Transport + 'static,
    {
        self.config.validate()?;
        let watch = self.watch.unwrap_or_default();
        let token = self.token.unwrap_or_default();
        let (producer, consumer) = channel(&self.config);
        let mut worker = Worker::new(
            self.config,
            consumer,
            transport,
            watch.clone(),
            token.signal(),
        );
        if let Some(sleeper) = self.sleeper {
            worker = worker.with_sleeper(sleeper);
        }
        let handle = thread::spawn(move || worker.run());
        Ok(QueueRunner {
            producer,
            token,
            watch,
            handle: Mutex::new(Some(handle)),
        })
    }
}

/// Handle to a running queue worker.
pub struct QueueRunner {
    producer: QueueProducer,
    token: CancellationToken,
    watch: WatchConfig,
    handle: Mutex<Option<JoinHandle<WorkerExit>>>,
}

impl QueueRunner {
    /// Start a worker with default options.
    pub fn spawn<T>(config: QueueConfig, transport: T) -> Result<Self, ConfigError>
    where
        T: Transport + 'static,
    {
        RunnerBuilder::new(config).spawn(transport)
    }

    pub fn builder(config: QueueConfig) -> RunnerBuilder {
        RunnerBuilder::new(config)
    }

    /// A producer feeding this runner's queue.
    pub fn producer(&self) -> QueueProducer {
        self.producer.clone()
    }

    pub fn enqueue(&self, item: WorkItem) -> Result<(), EnqueueError> {
        self.producer.enqueue(item)
    }

    pub fn watch(&self) -> &WatchConfig {
        &self.watch
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Ask the worker to stop at its next blocking point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Enqueue `Exit` behind any pending items and wait for the worker.
    ///
    /// Rejections still held back by the warning interval are reported first.
    pub fn close(self) -> Option<WorkerExit> {
        if let Err(err) = self.producer.enqueue(WorkItem::Exit) {
            warn!("logship: could not enqueue exit ({err}); waiting for worker");
        }
        self.producer.flush_warnings();
        self.join()
    }

    /// Wait for the worker to stop on its own.
    ///
    /// Returns `None` if the worker thread panicked.
    pub fn join(self) -> Option<WorkerExit> {
        self.join_worker()
    }

    fn join_worker(&self) -> Option<WorkerExit> {
        let handle = self.handle.lock().take()?;
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                warn!("logship: worker thread panicked");
                None
            }
        }
    }
}

impl Drop for QueueRunner {
    fn drop(&mut self) {
        self.producer.flush_warnings();
        if self.handle.lock().is_some() {
            self.token.cancel();
            self.join_worker();
        }
    }
}

impl std::fmt::Debug for QueueRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRunner")
            .field("pending", &self.producer.len())
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
