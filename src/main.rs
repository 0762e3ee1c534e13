use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use clap::Parser;
use color_eyre::eyre::{Result, bail, eyre};
use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use reqwest::Url;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pictor::domain::entities::{AccessToken, Placeholder, Rotation, ViewSize};
use pictor::domain::errors::LoadError;
use pictor::domain::ports::FileSystemPort;
use pictor::infrastructure::{
    AppConfig, Authorizator, ChannelDispatcher, CliArgs, ConfigStore, ImageLoader, LoaderPorts,
    LocalFileSystem, RasterPlatform, ReqwestTransport, SharedView, UiQueue, ViewRequest,
};
use pictor::presentation::HeadlessSlot;

type Outcome = Result<PathBuf, LoadError>;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn is_remote(source: &str) -> bool {
    Url::parse(source).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let store = match &args.config {
        Some(path) => ConfigStore::with_dir(
            path.parent().map_or_else(PathBuf::new, Path::to_path_buf),
        ),
        None => ConfigStore::new()?,
    };
    let mut config = store.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

fn access_token(value: &str, ttl_secs: i64) -> Result<AccessToken> {
    let expires_at = TimeDelta::try_seconds(ttl_secs)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| eyre!("token lifetime of {ttl_secs}s is out of range"))?;
    AccessToken::new(value, expires_at).ok_or_else(|| eyre!("access token is empty"))
}

fn build_loader(
    config: &AppConfig,
    args: &CliArgs,
) -> Result<(Arc<ImageLoader<RasterPlatform>>, UiQueue)> {
    let file_system: Arc<dyn FileSystemPort> = Arc::new(LocalFileSystem::new());
    let bundle_dir = config.effective_bundle_dir().unwrap_or_default();
    let platform = Arc::new(RasterPlatform::new(bundle_dir, Arc::clone(&file_system)));
    let transport = Arc::new(ReqwestTransport::with_timeout(config.request_timeout())?);
    let (dispatcher, queue) = ChannelDispatcher::new();

    let mut ports =
        LoaderPorts::new(platform, transport, Arc::new(dispatcher)).with_file_system(file_system);

    if let Some(token) = &args.access_token {
        let token = access_token(token, args.token_ttl)?;
        ports = ports.with_authorizator(Arc::new(Authorizator::with_token(token)));
    }

    Ok((ImageLoader::new(config.loader_config()?, ports), queue))
}

async fn run(config: AppConfig, args: CliArgs) -> Result<()> {
    let (loader, mut queue) = build_loader(&config, &args)?;
    let size = ViewSize::new(args.width, args.height);
    let rotation = Rotation::from_degrees(args.rotation);
    let outcomes: Arc<Mutex<Vec<(usize, Outcome)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut slots = Vec::with_capacity(args.sources.len());
    for (index, source) in args.sources.iter().enumerate() {
        let slot = Arc::new(HeadlessSlot::<Arc<DynamicImage>>::new(size));
        let view: SharedView<Arc<DynamicImage>> = slot.clone();
        slots.push(slot);

        let done = Arc::clone(&outcomes);
        let failed = Arc::clone(&outcomes);
        let request = ViewRequest::new()
            .rotation(rotation)
            .on_done(move |path| done.lock().push((index, Ok(path.to_path_buf()))))
            .on_error(move |e| failed.lock().push((index, Err(e))));

        if is_remote(source) {
            if args.refresh {
                loader.purge_remote_image(source)?;
            }
            loader.set_remote_image_for_view(
                source,
                Placeholder::bundle(&args.placeholder),
                &view,
                request,
            );
        } else if Path::new(source).is_file() {
            let path = std::fs::canonicalize(source)?;
            loader.set_image_for_view(path, &view, request);
        } else {
            outcomes
                .lock()
                .push((index, Err(LoadError::not_found(source.as_str()))));
        }
    }

    let deadline = config.request_timeout() * 2 + Duration::from_secs(5);
    let finished = tokio::time::timeout(deadline, async {
        while outcomes.lock().len() < args.sources.len() {
            if !queue.run_next().await {
                break;
            }
        }
    })
    .await;
    if finished.is_err() {
        warn!(timeout = ?deadline, "Gave up waiting for images");
    }

    let mut outcomes = std::mem::take(&mut *outcomes.lock());
    if outcomes.len() < args.sources.len() {
        warn!(
            missing = args.sources.len() - outcomes.len(),
            "Some requests never completed"
        );
    }
    outcomes.sort_by_key(|(index, _)| *index);
    for (index, outcome) in &outcomes {
        let source = &args.sources[*index];
        match outcome {
            Ok(path) => {
                let dims = slots[*index]
                    .content()
                    .map(|image| image.dimensions())
                    .unwrap_or_default();
                println!("{source} -> {} ({}x{})", path.display(), dims.0, dims.1);
            }
            Err(e) => println!("{source} !! {e}"),
        }
    }

    info!(stats = %loader.cache_stats(), "Done");
    loader.shutdown();

    if outcomes.iter().any(|(_, outcome)| outcome.is_err()) {
        bail!("some images could not be loaded");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = pictor::VERSION, "Starting pictor");

    run(config, args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_expires_after_ttl() {
        let token = access_token("secret", 60).unwrap();
        assert!(!token.is_expired_at(Utc::now()));
        assert!(token.is_expired_at(Utc::now() + TimeDelta::seconds(120)));
    }

    #[test]
    fn test_access_token_rejects_out_of_range_ttl() {
        assert!(access_token("secret", i64::MAX).is_err());
        assert!(access_token("secret", i64::MIN).is_err());
    }

    #[test]
    fn test_access_token_rejects_blank_value() {
        assert!(access_token("   ", 60).is_err());
    }
}
