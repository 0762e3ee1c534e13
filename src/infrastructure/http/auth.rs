//! Access-token holder for authenticated downloads.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::entities::AccessToken;

/// Holds the access token used to authorize image requests.
///
/// When a loader is configured with an authorizator, every download needs a
/// valid token; a missing or expired token fails the request before any
/// network traffic.
#[derive(Debug, Default)]
pub struct Authorizator {
    token: RwLock<Option<AccessToken>>,
}

impl Authorizator {
    /// Creates an authorizator without a token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an authorizator holding `token`.
    #[must_use]
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    /// Replaces the current token. Returns false if `value` is blank, in
    /// which case the previous token is dropped as well.
    pub fn refresh_access_token(&self, value: impl Into<String>, expires_at: DateTime<Utc>) -> bool {
        let token = AccessToken::new(value, expires_at);
        let accepted = token.is_some();
        if let Some(token) = &token {
            debug!(token = %token, expires_at = %expires_at, "Access token refreshed");
        }
        *self.token.write() = token;
        accepted
    }

    /// Forgets the current token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Returns true if a token is present and not expired.
    #[must_use]
    pub fn is_access_token_valid(&self) -> bool {
        self.bearer().is_some()
    }

    /// Returns the bearer value if the token is usable right now.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.bearer_at(Utc::now())
    }

    fn bearer_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|token| !token.is_expired_at(now))
            .map(|token| token.as_str().to_string())
    }
}
