//! Report encoder: renders store state into display-ready strings.
//!
//! Output format per entry:
//! - counters: `"<n>|c"`
//! - timers: `"<v>|ms"`, or `"<v1>;<v2>;...|ms"` once a name has more than
//!   one sample (in the order samples were recorded)
//! - the reserved [`MEMORY_METRIC`] entry: `"<bytes>|bytes"`
//!
//! Keys come back sorted, so log lines and tests see a stable order.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::naming::{method_to_metric, type_name_of};
use crate::scope::ScopeTimer;
use crate::store::{warn_negative, MetricStore};

/// Metric name -> formatted value, sorted by name.
pub type Report = BTreeMap<String, String>;

/// Reserved report key carrying the process memory footprint.
pub const MEMORY_METRIC: &str = "process.max_mem";

fn render_samples(samples: &[i64]) -> String {
    let mut out = String::new();
    for (i, v) in samples.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{v}");
    }
    out.push_str("|ms");
    out
}

impl MetricStore {
    /// Snapshot every counter and timer into a [`Report`].
    ///
    /// With `stop_running`, all running timers are stopped first (against
    /// one shared timestamp) so their elapsed time makes it into the output.
    /// A timer sharing a name with a counter replaces the counter's entry.
    pub fn report(&self, stop_running: bool) -> Report {
        let mem = self.memory.bytes();
        let now = self.now_millis();

        let mut st = self.lock();
        let stopped = if stop_running {
            st.stop_all(now)
        } else {
            Vec::new()
        };

        let mut r = Report::new();
        for (name, count) in &st.counters {
            r.insert(name.clone(), format!("{count}|c"));
        }
        for (name, samples) in &st.times {
            r.insert(name.clone(), render_samples(samples));
        }
        drop(st);
        warn_negative(&stopped);

        r.insert(MEMORY_METRIC.to_string(), format!("{mem}|bytes"));
        r
    }

    /// Start a [`ScopeTimer`] for `name`.
    pub fn time_scope(&self, name: impl Into<String>) -> ScopeTimer<'_> {
        ScopeTimer::new(self, name)
    }

    /// Start a [`ScopeTimer`] named after a call site (see [`method_to_metric`]).
    ///
    /// Typical use is the first line of the function being timed:
    /// `let _t = store.time_method(moar_metrics_core::method_path!(), None, None);`
    pub fn time_method(
        &self,
        qualified: &str,
        suffix: Option<&str>,
        instance_type: Option<&str>,
    ) -> ScopeTimer<'_> {
        self.time_scope(method_to_metric(qualified, suffix, instance_type))
    }

    /// Like [`time_method`](Self::time_method) with `T` as the instance type,
    /// so a method defined on a trait or base type is named after the
    /// concrete type it runs against.
    pub fn time_method_of<T: ?Sized>(
        &self,
        qualified: &str,
        suffix: Option<&str>,
    ) -> ScopeTimer<'_> {
        self.time_method(qualified, suffix, Some(type_name_of::<T>()))
    }
}
