//! Network transport port definition.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::domain::errors::TransportError;

/// A GET request against an absolute resource URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Absolute URL to fetch.
    pub url: Url,
    /// Bearer token sent in the `Authorization` header, if any.
    pub bearer: Option<String>,
}

/// Raw response returned by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, verbatim.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Port for issuing HTTP requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a GET request and returns the status with the raw body.
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
