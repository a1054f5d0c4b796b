//! moar-metrics core: the in-process counter/timer accumulator.
//!
//! This crate holds the metric store, scope-bound timers, the report encoder
//! and the call-site name normalizer. It carries no network or runtime
//! dependencies so it can be embedded anywhere; shipping reports to metricd
//! lives in `moar-metrics-client`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Instrumentation must never be the reason a host process crashes.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod error;
pub mod memory;
pub mod naming;
pub mod report;
pub mod scope;
pub mod store;

/// Shared result type.
pub use error::{MetricsError, Result};

pub use clock::{current_time_millis, Clock, SystemClock};
pub use memory::{MemoryProbe, ProcessMemory};
pub use naming::{method_to_metric, type_name_of};
pub use report::{Report, MEMORY_METRIC};
pub use scope::ScopeTimer;
pub use store::MetricStore;
