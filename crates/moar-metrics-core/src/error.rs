//! Shared error type across moar-metrics crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and client.
///
/// The store itself never fails; these surface from configuration and
/// setup paths, where a mistake should be loud rather than absorbed.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl MetricsError {
    /// Short stable label, handy for log fields and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricsError::BadConfig(_) => "BAD_CONFIG",
            MetricsError::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            MetricsError::Io(_) => "IO",
        }
    }
}
