//! Metric store: counters, completed timer samples, and running timers.
//!
//! All three namespaces live behind one mutex so that `report`, `stop_all`
//! and `reset` see a single consistent snapshot. Every batch operation takes
//! the lock once and applies the singular rule to each name in order.
//!
//! Timer misuse (stopping or canceling something that is not running,
//! starting something that already is) is not an error: the call is a no-op
//! and returns `false`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::memory::{MemoryProbe, ProcessMemory};

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) counters: BTreeMap<String, i64>,
    pub(crate) times: BTreeMap<String, Vec<i64>>,
    pub(crate) running: BTreeMap<String, i64>,
}

impl StoreState {
    fn adjust(&mut self, name: &str, delta: i64) {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        *counter = counter.wrapping_add(delta);
    }

    fn start(&mut self, name: &str, at_ms: i64) -> bool {
        if self.running.contains_key(name) {
            return false;
        }
        self.running.insert(name.to_string(), at_ms);
        true
    }

    /// Returns the recorded elapsed time, or `None` if `name` was not running.
    fn stop(&mut self, name: &str, at_ms: i64) -> Option<i64> {
        let started = self.running.remove(name)?;
        let elapsed = at_ms.wrapping_sub(started);
        self.record(name, elapsed);
        Some(elapsed)
    }

    fn stop_each(&mut self, names: &[&str], at_ms: i64) -> Vec<(String, i64)> {
        names
            .iter()
            .filter_map(|n| self.stop(n, at_ms).map(|e| (n.to_string(), e)))
            .collect()
    }

    fn cancel(&mut self, name: &str) -> bool {
        self.running.remove(name).is_some()
    }

    fn record(&mut self, name: &str, elapsed_ms: i64) {
        self.times.entry(name.to_string()).or_default().push(elapsed_ms);
    }

    pub(crate) fn stop_all(&mut self, at_ms: i64) -> Vec<(String, i64)> {
        let names: Vec<String> = self.running.keys().cloned().collect();
        names
            .into_iter()
            .filter_map(|n| self.stop(&n, at_ms).map(|e| (n, e)))
            .collect()
    }

    fn clear(&mut self) {
        self.counters.clear();
        self.times.clear();
        self.running.clear();
    }
}

/// Flag samples from timers stopped before they started.
///
/// Called after the store lock is released, so a subscriber that reads the
/// store from inside the event cannot deadlock.
pub(crate) fn warn_negative(stopped: &[(String, i64)]) {
    for (name, elapsed) in stopped.iter().filter(|(_, e)| *e < 0) {
        tracing::warn!(
            timer = %name,
            elapsed,
            "timer stopped before it started; recording negative sample"
        );
    }
}

/// Process-local metric accumulator.
///
/// Construct one per process (or per test) and share it by reference or
/// behind an `Arc`; nothing here is global.
pub struct MetricStore {
    state: Mutex<StoreState>,
    clock: Box<dyn Clock>,
    pub(crate) memory: Box<dyn MemoryProbe>,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore {
    /// Empty store using the system clock and real process memory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock: Box::new(SystemClock),
            memory: Box::new(ProcessMemory::new()),
        }
    }

    /// Replace the clock used when no explicit timestamp is given.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the probe behind the reserved memory entry.
    pub fn with_memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.memory = Box::new(probe);
        self
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Every mutation leaves the maps valid, so a poisoned lock is safe to reuse.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time according to the store's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    // ---- counters

    pub fn increment(&self, name: &str) {
        self.adjust_counter(name, 1);
    }

    pub fn decrement(&self, name: &str) {
        self.adjust_counter(name, -1);
    }

    pub fn increment_all(&self, names: &[&str]) {
        self.adjust_counters(names, 1);
    }

    pub fn decrement_all(&self, names: &[&str]) {
        self.adjust_counters(names, -1);
    }

    /// Add `delta` to a counter, creating it at zero first.
    pub fn adjust_counter(&self, name: &str, delta: i64) {
        self.lock().adjust(name, delta);
    }

    pub fn adjust_counters(&self, names: &[&str], delta: i64) {
        let mut st = self.lock();
        for name in names {
            st.adjust(name, delta);
        }
    }

    /// Current value of a counter, if it has ever been touched.
    pub fn counter_value(&self, name: &str) -> Option<i64> {
        self.lock().counters.get(name).copied()
    }

    // ---- timers

    /// Start a timer now. Returns `false` if it was already running; the
    /// original start time is kept.
    pub fn start_timer(&self, name: &str) -> bool {
        self.start_timer_at(name, self.now_millis())
    }

    pub fn start_timer_at(&self, name: &str, at_ms: i64) -> bool {
        self.lock().start(name, at_ms)
    }

    /// Start several timers with one shared timestamp. `true` if any started.
    pub fn start_timers(&self, names: &[&str]) -> bool {
        self.start_timers_at(names, self.now_millis())
    }

    pub fn start_timers_at(&self, names: &[&str], at_ms: i64) -> bool {
        let mut st = self.lock();
        names.iter().fold(false, |any, n| st.start(n, at_ms) | any)
    }

    /// Stop a running timer now and record its elapsed time.
    ///
    /// The elapsed value is `end - start` and is not validated: a caller
    /// supplied end before the start yields a negative sample.
    pub fn stop_timer(&self, name: &str) -> bool {
        self.stop_timer_at(name, self.now_millis())
    }

    pub fn stop_timer_at(&self, name: &str, at_ms: i64) -> bool {
        let elapsed = self.lock().stop(name, at_ms);
        match elapsed {
            Some(e) => {
                warn_negative(&[(name.to_string(), e)]);
                true
            }
            None => false,
        }
    }

    pub fn stop_timers(&self, names: &[&str]) -> bool {
        self.stop_timers_at(names, self.now_millis())
    }

    pub fn stop_timers_at(&self, names: &[&str], at_ms: i64) -> bool {
        let stopped = self.lock().stop_each(names, at_ms);
        warn_negative(&stopped);
        !stopped.is_empty()
    }

    /// Drop a running timer without recording a sample.
    pub fn cancel_timer(&self, name: &str) -> bool {
        self.lock().cancel(name)
    }

    pub fn cancel_timers(&self, names: &[&str]) -> bool {
        let mut st = self.lock();
        names.iter().fold(false, |any, n| st.cancel(n) | any)
    }

    /// Append an externally measured duration to a timer.
    pub fn record_timer(&self, name: &str, elapsed_ms: i64) {
        self.lock().record(name, elapsed_ms);
    }

    pub fn record_timers(&self, names: &[&str], elapsed_ms: i64) {
        let mut st = self.lock();
        for name in names {
            st.record(name, elapsed_ms);
        }
    }

    /// Elapsed time of a running timer without stopping it; 0 if not running.
    pub fn split_timer(&self, name: &str) -> i64 {
        self.split_timer_at(name, self.now_millis())
    }

    pub fn split_timer_at(&self, name: &str, now_ms: i64) -> i64 {
        self.lock()
            .running
            .get(name)
            .map(|started| now_ms.wrapping_sub(*started))
            .unwrap_or(0)
    }

    /// Names of running timers, sorted.
    pub fn running_timer_names(&self) -> Vec<String> {
        self.lock().running.keys().cloned().collect()
    }

    /// Completed samples for a timer, in stop order.
    pub fn timer_samples(&self, name: &str) -> Vec<i64> {
        self.lock().times.get(name).cloned().unwrap_or_default()
    }

    /// Stop every running timer against one captured "now".
    /// Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let now = self.now_millis();
        let stopped = self.lock().stop_all(now);
        warn_negative(&stopped);
        stopped.len()
    }

    /// Forget all counters, samples and running timers.
    pub fn reset(&self) {
        self.lock().clear();
    }
}
