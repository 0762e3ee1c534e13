//! Coalescing downloader for remote images.
//!
//! Concurrent requests for the same source URI share one network fetch. The
//! first caller creates a pending entry and starts the fetch on its own task;
//! later callers subscribe to that entry. When the fetch finishes the outcome
//! goes to every subscriber in registration order and the entry is removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, trace, warn};

use crate::domain::entities::ImageKey;
use crate::domain::errors::LoadError;
use crate::domain::ports::{FileSystemPort, HttpTransport, TransportRequest};
use crate::infrastructure::http::Authorizator;

/// Default number of fetches allowed on the network at once.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Outcome shared with every subscriber of a download.
pub type DownloadResult = Result<PathBuf, LoadError>;

/// A fetch in flight and the callers waiting on it.
#[derive(Debug, Default)]
struct PendingDownload {
    subscribers: Vec<oneshot::Sender<DownloadResult>>,
}

/// Downloaded file already present in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Location of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// Ensures at most one fetch per source URI and fans results out.
pub struct DownloadCoordinator {
    storage_dir: PathBuf,
    file_system: Arc<dyn FileSystemPort>,
    transport: Arc<dyn HttpTransport>,
    authorizator: Option<Arc<Authorizator>>,
    pending: Mutex<HashMap<String, PendingDownload>>,
    permits: Semaphore,
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("storage_dir", &self.storage_dir)
            .field("authorized", &self.authorizator.is_some())
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Creates a coordinator storing files under `storage_dir`.
    /// The folder is created on first write, not here.
    #[must_use]
    pub fn new(
        storage_dir: PathBuf,
        file_system: Arc<dyn FileSystemPort>,
        transport: Arc<dyn HttpTransport>,
        authorizator: Option<Arc<Authorizator>>,
    ) -> Self {
        Self {
            storage_dir,
            file_system,
            transport,
            authorizator,
            pending: Mutex::new(HashMap::new()),
            permits: Semaphore::new(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
        }
    }

    /// Limits how many distinct sources are fetched at once (minimum 1).
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.permits = Semaphore::new(max.max(1));
        self
    }

    /// Returns the storage folder.
    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Resolves where the download of `source` is stored.
    ///
    /// # Errors
    /// Returns [`LoadError::NetworkFailure`] if `source` is not an http(s) URL.
    pub fn local_path_for(&self, source: &str) -> Result<PathBuf, LoadError> {
        let url = parse_source(source)?;
        Ok(self.storage_dir.join(local_file_name(&url)))
    }

    /// Returns the stored download of `source`, if any.
    #[must_use]
    pub fn stored_file(&self, source: &str) -> Option<StoredFile> {
        let path = self.local_path_for(source).ok()?;
        if !self.file_system.file_exists(&path) {
            return None;
        }
        let size = self.file_system.file_size(&path).ok()?;
        Some(StoredFile { path, size })
    }

    /// Deletes the stored download of `source`.
    /// Returns the path that was removed.
    ///
    /// # Errors
    /// Returns error if `source` is invalid or the file cannot be deleted.
    pub fn delete_stored(&self, source: &str) -> Result<PathBuf, LoadError> {
        let path = self.local_path_for(source)?;
        self.file_system
            .delete_file(&path)
            .map_err(|e| LoadError::network(e.to_string()))?;
        Ok(path)
    }

    /// Returns the number of fetches in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the number of callers waiting on `source`.
    #[must_use]
    pub fn subscriber_count(&self, source: &str) -> usize {
        let Ok(url) = parse_source(source) else {
            return 0;
        };
        self.pending
            .lock()
            .get(url.as_str())
            .map_or(0, |p| p.subscribers.len())
    }

    /// Returns true if a fetch for `source` is in flight.
    #[must_use]
    pub fn is_downloading(&self, source: &str) -> bool {
        self.subscriber_count(source) > 0
    }

    /// Makes `source` available as a local file and returns its path.
    ///
    /// An already stored file is returned without touching the network. If
    /// a fetch for `source` is in flight the caller waits for that fetch
    /// instead of issuing another one. Failures are reported once; there is
    /// no retry.
    ///
    /// # Errors
    /// [`LoadError::AuthFailure`] when authorization is configured and no
    /// valid token is available, [`LoadError::NetworkFailure`] for invalid
    /// URIs, transport errors, non-success statuses and storage errors.
    pub async fn download(self: &Arc<Self>, source: &str) -> DownloadResult {
        let url = parse_source(source)?;
        let local_path = self.storage_dir.join(local_file_name(&url));

        if self.file_system.file_exists(&local_path) {
            debug!(url = %url, path = %local_path.display(), "Using stored file");
            return Ok(local_path);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if let Some(download) = pending.get_mut(url.as_str()) {
                trace!(url = %url, "Joining in-flight download");
                download.subscribers.push(tx);
            } else {
                let bearer = match &self.authorizator {
                    Some(auth) => match auth.bearer() {
                        Some(bearer) => Some(bearer),
                        None => {
                            warn!(url = %url, "No valid access token, skipping download");
                            return Err(LoadError::AuthFailure);
                        }
                    },
                    None => None,
                };

                pending.insert(
                    url.as_str().to_string(),
                    PendingDownload {
                        subscribers: vec![tx],
                    },
                );

                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let key = url.as_str().to_string();
                    let result = this.fetch(url, bearer, local_path).await;
                    this.notify_subscribers(&key, &result);
                });
            }
        }

        rx.await
            .unwrap_or_else(|_| Err(LoadError::network("download task ended without a result")))
    }

    async fn fetch(&self, url: Url, bearer: Option<String>, local_path: PathBuf) -> DownloadResult {
        if self.file_system.file_exists(&local_path) {
            return Ok(local_path);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LoadError::network(e.to_string()))?;

        debug!(url = %url, "Downloading image from network");
        let response = self
            .transport
            .get(TransportRequest {
                url: url.clone(),
                bearer,
            })
            .await
            .map_err(|e| LoadError::network(e.to_string()))?;

        if !response.is_success() {
            warn!(url = %url, status = response.status, "Download rejected");
            return Err(LoadError::network(format!("HTTP {}", response.status)));
        }

        let file_system = Arc::clone(&self.file_system);
        let storage_dir = self.storage_dir.clone();
        let path = local_path.clone();
        let size = response.body.len();
        tokio::task::spawn_blocking(move || {
            if !file_system.folder_exists(&storage_dir) {
                file_system.create_folder(&storage_dir)?;
            }
            file_system.write_file(&path, &response.body)
        })
        .await
        .map_err(|e| LoadError::network(format!("storage task panicked: {e}")))?
        .map_err(|e| LoadError::network(e.to_string()))?;

        info!(url = %url, path = %local_path.display(), size, "Image downloaded");
        Ok(local_path)
    }

    fn notify_subscribers(&self, key: &str, result: &DownloadResult) {
        let subscribers = self
            .pending
            .lock()
            .remove(key)
            .map(|p| p.subscribers)
            .unwrap_or_default();

        trace!(url = key, count = subscribers.len(), ok = result.is_ok(), "Notifying subscribers");
        for subscriber in subscribers {
            let _ = subscriber.send(result.clone());
        }
    }
}

/// Parses and validates a remote source.
fn parse_source(source: &str) -> Result<Url, LoadError> {
    let url = Url::parse(source.trim())
        .map_err(|e| LoadError::network(format!("invalid URI {source}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => Err(LoadError::network(format!(
            "unsupported URI {source} (scheme {scheme})"
        ))),
    }
}

/// File name a download is stored under: the last path segment of the URL,
/// or a hash of the whole URL when there is no usable segment.
fn local_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map_or_else(
            || ImageKey::hashed(url.as_str()).as_str().to_string(),
            ToString::to_string,
        )
}
