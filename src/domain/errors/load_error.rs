//! Image loading error types.

use thiserror::Error;

/// Failures of the image loading pipeline.
///
/// Errors are `Clone` because one download outcome is fanned out to every
/// subscriber waiting on the same source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The referenced local file does not exist.
    #[error("image not found: {0}")]
    NotFound(String),

    /// Image data is corrupt or in an unsupported format.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Host unreachable, non-success status or the download could not be stored.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Access token missing or expired; no request was attempted.
    #[error("no valid access token available")]
    AuthFailure,

    /// Result no longer matches the slot binding and was dropped.
    #[error("superseded by a newer request")]
    RaceDiscarded,
}

impl LoadError {
    /// Creates not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure(message.into())
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure(message.into())
    }

    /// Returns whether the error should be reported to callers.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::RaceDiscarded)
    }

    /// Returns whether the error came from the remote side.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::NetworkFailure(_) | Self::AuthFailure)
    }
}
