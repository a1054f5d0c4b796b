//! Scope-bound timer handle.
//!
//! Starts a timer on construction and stops it when dropped, so functions
//! with several exit points (early `return`, `?`, unwinding) still record
//! exactly one sample.

use crate::store::MetricStore;

/// Timer that stops itself when it goes out of scope.
#[must_use = "the timer stops as soon as the handle is dropped"]
pub struct ScopeTimer<'a> {
    store: &'a MetricStore,
    name: String,
    running: bool,
}

impl<'a> ScopeTimer<'a> {
    /// Start `name` on `store`.
    ///
    /// If a timer with this name is already running it keeps its original
    /// start; this handle still stops it when done.
    pub fn new(store: &'a MetricStore, name: impl Into<String>) -> Self {
        let name = name.into();
        store.start_timer(&name);
        Self {
            store,
            name,
            running: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the timer. Only the first call has any effect.
    pub fn stop(&mut self) {
        if self.running {
            self.store.stop_timer(&self.name);
            self.running = false;
        }
    }
}

impl Drop for ScopeTimer<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}
