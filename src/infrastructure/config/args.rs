use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Default name of the bundled placeholder asset.
pub const DEFAULT_PLACEHOLDER: &str = "placeholder.png";

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "pictor",
    version,
    about = "Load images into headless display slots through a shared cache",
    long_about = None
)]
pub struct CliArgs {
    /// Images to load: local files or http(s) URLs.
    #[arg(value_name = "SOURCE", required = true)]
    pub sources: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Slot width in pixels (0 = unconstrained).
    #[arg(long, default_value_t = 0)]
    pub width: u32,

    /// Slot height in pixels (0 = unconstrained).
    #[arg(long, default_value_t = 0)]
    pub height: u32,

    /// Clockwise rotation in degrees.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub rotation: i32,

    /// Bundled asset shown while remote images download.
    #[arg(long, default_value = DEFAULT_PLACEHOLDER)]
    pub placeholder: String,

    /// Folder bundled assets are read from.
    #[arg(long, value_name = "PATH")]
    pub bundle_dir: Option<PathBuf>,

    /// Folder downloads are stored in.
    #[arg(long, value_name = "PATH")]
    pub storage_dir: Option<PathBuf>,

    /// Maximum decoded images kept in memory.
    #[arg(long)]
    pub cache_size: Option<usize>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Delete stored downloads before loading.
    #[arg(long)]
    pub refresh: bool,

    /// Access token sent with every download.
    #[arg(long, env = "PICTOR_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Access token lifetime in seconds.
    #[arg(long, default_value_t = 3600)]
    pub token_ttl: i64,
}
