//! Network transport error types.

use thiserror::Error;

/// Transport-level failures. HTTP status codes are not errors here; they are
/// reported through the response.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}
