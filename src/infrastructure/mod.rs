//! Infrastructure layer with adapters and the image pipeline.

/// Application configuration.
pub mod config;
/// UI dispatchers.
pub mod dispatch;
/// File system adapters.
pub mod fs;
/// HTTP transport and authorization.
pub mod http;
/// Image handling (caching, downloading, loading).
pub mod image;

pub use config::{AppConfig, CliArgs, ConfigError, ConfigStore, LogLevel};
pub use dispatch::{ChannelDispatcher, InlineDispatcher, UiQueue};
pub use fs::LocalFileSystem;
pub use http::{Authorizator, ReqwestTransport};
pub use self::image::{
    CacheStats, ImageLoader, ImageLoaderConfig, LoaderPorts, RasterPlatform, SharedView,
    ViewRequest,
};
