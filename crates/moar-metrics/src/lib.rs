//! Top-level facade crate for moar-metrics.
//!
//! Re-exports the accumulator and the metricd client so users can depend on a single crate.

pub mod core {
    pub use moar_metrics_core::*;
}

pub mod client {
    pub use moar_metrics_client::*;
}

pub use moar_metrics_client::{metricd, log_report, MetricdClient};
pub use moar_metrics_core::{method_path, method_to_metric, MetricStore, Report, ScopeTimer};
