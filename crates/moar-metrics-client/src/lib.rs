//! moar-metrics client library entry.
//!
//! Ships reports produced by `moar-metrics-core` to a metricd aggregation
//! daemon as single UDP datagrams, loads client configuration, and writes
//! reports to the process log. Consumed by the `moar-metricd-send` binary
//! and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod log;

pub use client::{metricd, ErrorCallback, MetricdClient};
pub use error::ExportError;
pub use self::log::log_report;
