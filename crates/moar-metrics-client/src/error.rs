//! Failures on the export path.
//!
//! These never escape [`MetricdClient::send`](crate::MetricdClient::send);
//! they are surfaced by `try_send` and handed to the error callback.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Payload could not be built or serialized.
    #[error("encode failed: {0}")]
    Encode(String),
    /// Encoded payload does not fit in one UDP datagram.
    #[error("payload of {0} bytes exceeds a single datagram")]
    Oversized(usize),
    /// Resolve, bind or send failed.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),
    /// The send did not complete in time.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// No tokio runtime to run the send on.
    #[error("no tokio runtime available")]
    NoRuntime,
    /// The send task failed (e.g. the runtime lacks the IO or time driver).
    #[error("send task failed: {0}")]
    Task(String),
}
