//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::infrastructure::http::DEFAULT_TIMEOUT_SECS;
use crate::infrastructure::image::{
    DEFAULT_CACHE_SIZE, DEFAULT_MAX_CONCURRENT_DOWNLOADS, ImageLoaderConfig, MIN_CACHE_SIZE,
};

const APP_NAME: &str = "pictor";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by
/// command line arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Folder bundled placeholder assets are read from.
    #[serde(default)]
    pub bundle_dir: Option<PathBuf>,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum decoded images kept in memory.
    #[serde(default = "default_memory_cache_size")]
    pub memory_cache_size: usize,

    /// Folder downloads are stored in. Defaults to the user cache folder.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: default_memory_cache_size(),
            storage_dir: None,
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent downloads.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

fn default_memory_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(bundle_dir) = &args.bundle_dir {
            self.bundle_dir = Some(bundle_dir.clone());
        }
        if let Some(storage_dir) = &args.storage_dir {
            self.cache.storage_dir = Some(storage_dir.clone());
        }
        if let Some(cache_size) = args.cache_size {
            self.cache.memory_cache_size = cache_size;
        }
        if let Some(timeout) = args.timeout {
            self.network.request_timeout_secs = timeout;
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("pictor.log"))
    }

    /// Returns default download folder.
    #[must_use]
    pub fn default_storage_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.cache_dir().join("images"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns effective download folder.
    #[must_use]
    pub fn effective_storage_dir(&self) -> Option<PathBuf> {
        self.cache
            .storage_dir
            .clone()
            .or_else(Self::default_storage_dir)
    }

    /// Returns effective bundled asset folder.
    #[must_use]
    pub fn effective_bundle_dir(&self) -> Option<PathBuf> {
        self.bundle_dir
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("assets")))
    }

    /// Returns the request timeout. Zero means the transport default.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        match self.network.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Builds the image loader configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no storage folder is configured and the
    /// default one cannot be determined.
    pub fn loader_config(&self) -> Result<ImageLoaderConfig, ConfigError> {
        let storage_dir = self
            .effective_storage_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?;
        Ok(ImageLoaderConfig {
            memory_cache_size: self.cache.memory_cache_size.max(MIN_CACHE_SIZE),
            storage_dir,
            max_concurrent_downloads: self.network.max_concurrent_downloads.max(1),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            bundle_dir: None,
            cache: CacheConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}
