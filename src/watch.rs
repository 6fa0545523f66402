//! Shared set of watched file patterns.
//!
//! The worker adds patterns as `AddGlob` items arrive; other threads (a file
//! tailer, a status endpoint) read the same set through cheap clones of the
//! handle.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;

use crate::item::Options;

/// Cloneable handle onto the watched glob patterns and their options.
#[derive(Clone, Debug, Default)]
pub struct WatchConfig {
    globs: Arc<RwLock<BTreeMap<String, Options>>>,
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `pattern`. Returns `true` when the pattern is new.
    pub fn add(&self, pattern: String, options: Options) -> bool {
        self.globs.write().insert(pattern, options).is_none()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.globs.read().contains_key(pattern)
    }

    /// Options registered for `pattern`.
    pub fn options(&self, pattern: &str) -> Option<Options> {
        self.globs.read().get(pattern).cloned()
    }

    /// Patterns in lexical order.
    pub fn patterns(&self) -> Vec<String> {
        self.globs.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.globs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.globs.read().is_empty()
    }
}
