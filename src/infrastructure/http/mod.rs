//! HTTP adapters.

mod auth;
mod transport;

pub use auth::Authorizator;
pub use transport::{DEFAULT_TIMEOUT_SECS, ReqwestTransport};
