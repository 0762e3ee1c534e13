//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::{debug, warn};

use crate::domain::errors::TransportError;
use crate::domain::ports::{HttpTransport, TransportRequest, TransportResponse};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

const USER_AGENT: &str = concat!("pictor/", env!("CARGO_PKG_VERSION"));

/// Transport issuing plain GET requests through a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom timeout. A zero timeout falls back
    /// to [`DEFAULT_TIMEOUT_SECS`].
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let timeout = if timeout.is_zero() {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            timeout
        };
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Returns the effective request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        debug!(url = %request.url, authorized = request.bearer.is_some(), "Sending GET request");

        let mut builder = self.client.get(request.url.clone());
        if let Some(bearer) = &request.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Request failed");
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        debug!(url = %request.url, status = status.as_u16(), size = body.len(), "Received response");

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}
