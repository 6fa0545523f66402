//! A transport whose outcomes are scripted by the test.
//!
//! Clones share state, so a test keeps one clone for assertions while the
//! worker owns another.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    item::{Batch, Options},
    transport::{CallbackError, FatalItemError, Transport, TransportError},
};

/// Operations observed by the transport, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Callback(Vec<String>),
    Invalidate,
    Reconnect,
    Interrupt,
    AddGlob(String),
}

enum Outcome {
    Recoverable,
    Fatal(String),
}

struct Script {
    valid: bool,
    callback_outcomes: VecDeque<Outcome>,
    reconnect_failures: usize,
    calls: Vec<Call>,
    delivered: Vec<Vec<String>>,
}

/// Transport driven by queued outcomes; succeeds once the script runs out.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                valid: true,
                callback_outcomes: VecDeque::new(),
                reconnect_failures: 0,
                calls: Vec::new(),
                delivered: Vec::new(),
            })),
        }
    }

    /// Fail the next `n` callbacks with a recoverable error.
    pub fn fail_callbacks(&self, n: usize) {
        let mut script = self.script.lock();
        script
            .callback_outcomes
            .extend((0..n).map(|_| Outcome::Recoverable));
    }

    /// Fail the next callback with a fatal error.
    pub fn fail_fatal_next(&self, reason: &str) {
        self.script
            .lock()
            .callback_outcomes
            .push_back(Outcome::Fatal(reason.to_string()));
    }

    /// Leave the transport invalid after the next `n` reconnects.
    pub fn fail_reconnects(&self, n: usize) {
        self.script.lock().reconnect_failures += n;
    }

    pub fn set_valid(&self, valid: bool) {
        self.script.lock().valid = valid;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn delivered(&self) -> Vec<Vec<String>> {
        self.script.lock().delivered.clone()
    }

    pub fn interrupts(&self) -> usize {
        self.count(|call| *call == Call::Interrupt)
    }

    pub fn globs(&self) -> Vec<String> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::AddGlob(pattern) => Some(pattern.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

impl Transport for ScriptedTransport {
    fn valid(&self) -> bool {
        self.script.lock().valid
    }

    fn callback(&mut self, batch: &Batch) -> Result<(), CallbackError> {
        let mut script = self.script.lock();
        script.calls.push(Call::Callback(batch.lines.clone()));
        match script.callback_outcomes.pop_front() {
            None => {
                script.delivered.push(batch.lines.clone());
                Ok(())
            }
            Some(Outcome::Recoverable) => Err(TransportError::NotConnected.into()),
            Some(Outcome::Fatal(reason)) => Err(FatalItemError::Rejected(reason).into()),
        }
    }

    fn invalidate(&mut self) {
        let mut script = self.script.lock();
        script.calls.push(Call::Invalidate);
        script.valid = false;
    }

    fn reconnect(&mut self) {
        let mut script = self.script.lock();
        script.calls.push(Call::Reconnect);
        if script.reconnect_failures > 0 {
            script.reconnect_failures -= 1;
        } else {
            script.valid = true;
        }
    }

    fn interrupt(&mut self) {
        let mut script = self.script.lock();
        script.calls.push(Call::Interrupt);
        script.valid = false;
    }

    fn add_glob(&mut self, pattern: &str, _options: &Options) {
        self.script.lock().calls.push(Call::AddGlob(pattern.to_string()));
    }
}
