//! Image loader facade.
//!
//! Binds images to display slots. Local files are decoded off the UI
//! context and kept in the memory cache; remote sources are downloaded once
//! into the storage folder and then bound like local files. Every completion
//! is handed to the [`UiDispatcher`] and applied only if the slot still wants
//! that image.
//!
//! Public methods are meant to be called from the UI context.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use super::bindings::ViewBindingRegistry;
use super::download::{
    DEFAULT_MAX_CONCURRENT_DOWNLOADS, DownloadCoordinator, DownloadResult, StoredFile,
};
use super::memory_cache::{CacheStats, DEFAULT_CACHE_SIZE, MemoryImageCache};
use crate::domain::entities::{
    ImageKey, ImageSource, Placeholder, Rotation, SlotId, SlotIdAllocator, ViewSize,
};
use crate::domain::errors::LoadError;
use crate::domain::ports::{FileSystemPort, HttpTransport, ImagePlatform, ImageView, UiDispatcher};
use crate::infrastructure::fs::LocalFileSystem;
use crate::infrastructure::http::Authorizator;

/// Shared handle to a display slot.
pub type SharedView<I> = Arc<dyn ImageView<I>>;

/// Called with the bound file once an image is shown.
pub type DoneCallback = Box<dyn FnOnce(&Path) + Send + 'static>;

/// Called when a request fails for a reason worth reporting.
pub type ErrorCallback = Box<dyn FnOnce(LoadError) + Send + 'static>;

/// Configuration for the image loader.
#[derive(Debug, Clone)]
pub struct ImageLoaderConfig {
    /// Maximum images in memory cache.
    pub memory_cache_size: usize,
    /// Folder remote images are downloaded into.
    pub storage_dir: PathBuf,
    /// Maximum concurrent downloads.
    pub max_concurrent_downloads: usize,
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: DEFAULT_CACHE_SIZE,
            storage_dir: std::env::temp_dir().join("pictor").join("images"),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

/// Collaborators the loader is wired to.
pub struct LoaderPorts<P: ImagePlatform> {
    /// Decodes and releases images.
    pub platform: Arc<P>,
    /// Local file access.
    pub file_system: Arc<dyn FileSystemPort>,
    /// Network access for remote sources.
    pub transport: Arc<dyn HttpTransport>,
    /// Runs slot mutations on the UI context.
    pub dispatcher: Arc<dyn UiDispatcher>,
    /// Token holder; when set every download must be authorized.
    pub authorizator: Option<Arc<Authorizator>>,
}

impl<P: ImagePlatform> LoaderPorts<P> {
    /// Creates ports backed by the local file system, without authorization.
    #[must_use]
    pub fn new(
        platform: Arc<P>,
        transport: Arc<dyn HttpTransport>,
        dispatcher: Arc<dyn UiDispatcher>,
    ) -> Self {
        Self {
            platform,
            file_system: Arc::new(LocalFileSystem::new()),
            transport,
            dispatcher,
            authorizator: None,
        }
    }

    /// Requires a valid token from `authorizator` for every download.
    #[must_use]
    pub fn with_authorizator(mut self, authorizator: Arc<Authorizator>) -> Self {
        self.authorizator = Some(authorizator);
        self
    }

    /// Replaces the file system adapter.
    #[must_use]
    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystemPort>) -> Self {
        self.file_system = file_system;
        self
    }
}

/// Options of a single bind request.
pub struct ViewRequest<I> {
    loader_view: Option<SharedView<I>>,
    rotation: Rotation,
    hide_while_loading: bool,
    on_done: Option<DoneCallback>,
    on_error: Option<ErrorCallback>,
}

impl<I> Default for ViewRequest<I> {
    fn default() -> Self {
        Self {
            loader_view: None,
            rotation: Rotation::None,
            hide_while_loading: true,
            on_done: None,
            on_error: None,
        }
    }
}

impl<I> std::fmt::Debug for ViewRequest<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRequest")
            .field("loader_view", &self.loader_view.is_some())
            .field("rotation", &self.rotation)
            .field("hide_while_loading", &self.hide_while_loading)
            .finish_non_exhaustive()
    }
}

impl<I> ViewRequest<I> {
    /// Creates a request that hides the slot while loading.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `view` while the image loads.
    #[must_use]
    pub fn with_loader_view(mut self, view: &SharedView<I>) -> Self {
        self.loader_view = Some(Arc::clone(view));
        self
    }

    /// Rotates the decoded image.
    #[must_use]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Whether the slot is hidden until the image is ready.
    #[must_use]
    pub fn hide_while_loading(mut self, hide: bool) -> Self {
        self.hide_while_loading = hide;
        self
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn on_done(mut self, callback: impl FnOnce(&Path) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error(mut self, callback: impl FnOnce(LoadError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    fn show_loading(&self, view: &dyn ImageView<I>) {
        if self.hide_while_loading {
            view.set_visible(false);
            if let Some(loader) = &self.loader_view {
                loader.set_visible(true);
            }
        }
    }

    fn show_result(&self, view: &dyn ImageView<I>) {
        if self.hide_while_loading && !view.is_visible() {
            view.set_visible(true);
        }
        if let Some(loader) = &self.loader_view {
            loader.set_visible(false);
        }
    }

    fn finish(self, path: &Path) {
        if let Some(done) = self.on_done {
            done(path);
        }
    }

    fn fail(self, what: &str, error: LoadError) {
        if !error.is_reportable() {
            debug!(source = what, error = %error, "Image request dropped");
            return;
        }
        warn!(source = what, error = %error, "Image load failed");
        if let Some(on_error) = self.on_error {
            on_error(error);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindMode {
    SkipUnchanged,
    Force,
}

/// Loads images into display slots.
pub struct ImageLoader<P: ImagePlatform> {
    platform: Arc<P>,
    cache: MemoryImageCache<P>,
    registry: ViewBindingRegistry,
    downloads: Arc<DownloadCoordinator>,
    file_system: Arc<dyn FileSystemPort>,
    dispatcher: Arc<dyn UiDispatcher>,
    slot_ids: SlotIdAllocator,
    views: Mutex<HashMap<SlotId, Weak<dyn ImageView<P::Image>>>>,
    /// Bumped on invalidation; decodes started under an older value are
    /// not cached.
    generations: Mutex<HashMap<ImageKey, u64>>,
    runtime: Handle,
    shut_down: AtomicBool,
}

impl<P: ImagePlatform> std::fmt::Debug for ImageLoader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("cache", &self.cache)
            .field("downloads", &self.downloads)
            .field("bound_slots", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<P: ImagePlatform> ImageLoader<P> {
    /// Creates a loader. Background work runs on the current Tokio runtime,
    /// so the returned loader may be driven from threads outside it.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(config: ImageLoaderConfig, ports: LoaderPorts<P>) -> Arc<Self> {
        let downloads = DownloadCoordinator::new(
            config.storage_dir,
            Arc::clone(&ports.file_system),
            ports.transport,
            ports.authorizator,
        )
        .with_max_concurrent(config.max_concurrent_downloads);
        let cache = MemoryImageCache::new(config.memory_cache_size, Arc::clone(&ports.platform));

        info!(
            capacity = cache.capacity(),
            storage = %downloads.storage_dir().display(),
            "Image loader ready"
        );

        Arc::new(Self {
            platform: ports.platform,
            cache,
            registry: ViewBindingRegistry::new(),
            downloads: Arc::new(downloads),
            file_system: ports.file_system,
            dispatcher: ports.dispatcher,
            slot_ids: SlotIdAllocator::new(),
            views: Mutex::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            runtime: Handle::current(),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Binds a local image file to `view`.
    ///
    /// Does nothing if the file does not exist, or if `view` already shows
    /// this file. Otherwise the image comes from the memory cache or is
    /// decoded in the background towards the slot size. The result is
    /// applied only if no newer request for `view` was made in the meantime.
    pub fn set_image_for_view(
        self: &Arc<Self>,
        path: impl AsRef<Path>,
        view: &SharedView<P::Image>,
        request: ViewRequest<P::Image>,
    ) {
        self.bind_local(
            path.as_ref().to_path_buf(),
            Arc::clone(view),
            request,
            BindMode::SkipUnchanged,
        );
    }

    /// Binds a remote image to `view`, showing `placeholder` until it is
    /// available and again if the download fails.
    pub fn set_remote_image_for_view(
        self: &Arc<Self>,
        source: &str,
        placeholder: Placeholder,
        view: &SharedView<P::Image>,
        request: ViewRequest<P::Image>,
    ) {
        if self.is_shut_down() {
            return;
        }
        let view = Arc::clone(view);
        let slot = self.track(&view);

        let target_path = match self.downloads.local_path_for(source) {
            Ok(path) => path,
            Err(e) => {
                self.registry.unregister(slot);
                if let Placeholder::Bundle(name) = &placeholder {
                    if let Some(image) = self.bundled(name) {
                        view.set_content(Some(image));
                    }
                }
                let source = source.to_string();
                self.dispatcher
                    .dispatch(Box::new(move || request.fail(&source, e)));
                return;
            }
        };

        let key = ImageKey::from_path(&target_path);
        if self.registry.current(slot).as_ref() == Some(&key) && view.has_content() {
            trace!(slot = %slot, source, "Slot already bound to source");
            return;
        }
        self.registry.register(slot, &key);

        let bundled = match &placeholder {
            Placeholder::Bundle(name) => self.bundled(name),
            Placeholder::File(_) => None,
        };
        if let Some(image) = &bundled {
            view.set_content(Some(image.clone()));
        }

        let target = view.size();
        let source = source.to_string();
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let placeholder_image = match (bundled, &placeholder) {
                (Some(image), _) => Some(image),
                (None, Placeholder::File(path)) => {
                    this.apply_file_placeholder(slot, &key, path, target, &view)
                        .await
                }
                (None, Placeholder::Bundle(_)) => None,
            };

            let result = this.downloads.download(&source).await;
            let ui = Arc::clone(&this);
            this.dispatcher.dispatch(Box::new(move || {
                ui.complete_remote(slot, &key, &source, view, request, placeholder_image, result);
            }));
        });
    }

    /// Shows a bundled asset in `view` and forgets any pending request for it.
    ///
    /// # Errors
    /// Returns error if the asset cannot be decoded; the slot is still unbound.
    pub fn set_placeholder_for_view(
        &self,
        name: &str,
        view: &SharedView<P::Image>,
    ) -> Result<(), LoadError> {
        let slot = self.track(view);
        self.registry.unregister(slot);
        let image = self.platform.decode_from_bundle(name)?;
        view.set_content(Some(image));
        Ok(())
    }

    /// Drops a local image everywhere: slots bound to `path` are unbound and
    /// cleared, and the cached copy is released. Returns how many slots were
    /// cleared.
    pub fn invalidate_image(&self, path: impl AsRef<Path>) -> usize {
        let key = ImageKey::from_path(path.as_ref());
        let slots = self.registry.unregister_key(&key);
        let views: Vec<_> = {
            let views = self.views.lock();
            slots
                .iter()
                .filter_map(|slot| views.get(slot).and_then(Weak::upgrade))
                .collect()
        };
        for view in &views {
            view.set_content(None);
        }
        let evicted = {
            let mut generations = self.generations.lock();
            *generations.entry(key.clone()).or_default() += 1;
            self.cache.evict(&key)
        };
        debug!(key = %key, slots = slots.len(), evicted, "Invalidated image");
        views.len()
    }

    /// Invalidates the downloaded copy of `source`.
    ///
    /// # Errors
    /// Returns error if `source` is not a valid remote URI.
    pub fn invalidate_remote_image(&self, source: &str) -> Result<usize, LoadError> {
        let path = self.downloads.local_path_for(source)?;
        Ok(self.invalidate_image(path))
    }

    /// Invalidates `source` and deletes its downloaded file.
    ///
    /// # Errors
    /// Returns error if `source` is invalid or the file cannot be deleted.
    pub fn purge_remote_image(&self, source: &str) -> Result<usize, LoadError> {
        let cleared = self.invalidate_remote_image(source)?;
        self.downloads.delete_stored(source)?;
        Ok(cleared)
    }

    /// Downloads `source` into the storage folder without binding it.
    ///
    /// # Errors
    /// Same as [`DownloadCoordinator::download`].
    pub async fn fetch(&self, source: &str) -> DownloadResult {
        self.downloads.download(source).await
    }

    /// Starts background downloads for `sources`.
    pub fn prefetch<I, S>(&self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for source in sources {
            let source = source.into();
            let downloads = Arc::clone(&self.downloads);
            self.runtime.spawn(async move {
                if let Err(e) = downloads.download(&source).await {
                    warn!(source, error = %e, "Prefetch failed");
                }
            });
        }
    }

    /// Returns the downloaded copy of `source`, if present.
    #[must_use]
    pub fn stored_file(&self, source: &str) -> Option<StoredFile> {
        self.downloads.stored_file(source)
    }

    /// Changes the memory cache capacity, never below the minimum.
    /// Returns the capacity applied.
    pub fn set_max_cache_size(&self, size: usize) -> usize {
        self.cache.set_capacity(size)
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Returns the folder remote images are stored in.
    #[must_use]
    pub fn storage_folder(&self) -> &Path {
        self.downloads.storage_dir()
    }

    /// Returns the number of slots with a pending or shown image.
    #[must_use]
    pub fn bound_slots(&self) -> usize {
        self.registry.len()
    }

    /// Returns the number of downloads in flight.
    #[must_use]
    pub fn pending_downloads(&self) -> usize {
        self.downloads.pending_count()
    }

    /// Releases every cached image and ignores further requests.
    /// Work already running is discarded when it completes.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.clear();
        self.views.lock().clear();
        self.generations.lock().clear();
        self.cache.clear();
        info!("Image loader shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Returns the id of `view`, remembering the view for invalidation.
    /// Slots whose views were dropped are forgotten along the way.
    fn track(&self, view: &SharedView<P::Image>) -> SlotId {
        let slot = view.tag().get_or_assign(&self.slot_ids);
        let mut views = self.views.lock();
        if !views.contains_key(&slot) {
            views.retain(|id, weak| {
                let alive = weak.strong_count() > 0;
                if !alive {
                    self.registry.unregister(*id);
                }
                alive
            });
            views.insert(slot, Arc::downgrade(view));
        }
        slot
    }

    fn bundled(&self, name: &str) -> Option<P::Image> {
        match self.platform.decode_from_bundle(name) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(name, error = %e, "Placeholder unavailable");
                None
            }
        }
    }

    fn bind_local(
        self: &Arc<Self>,
        path: PathBuf,
        view: SharedView<P::Image>,
        request: ViewRequest<P::Image>,
        mode: BindMode,
    ) {
        if self.is_shut_down() {
            return;
        }
        if !self.file_system.file_exists(&path) {
            debug!(path = %path.display(), "Image file missing, ignoring request");
            return;
        }

        let slot = self.track(&view);
        let key = ImageKey::from_path(&path);
        let changed = self.registry.register(slot, &key);
        if mode == BindMode::SkipUnchanged && !changed && view.has_content() {
            trace!(slot = %slot, key = %key, "Slot already shows image");
            return;
        }

        if let Some(image) = self.cache.get(&key) {
            view.set_content(Some(image));
            request.show_result(view.as_ref());
            debug!(slot = %slot, key = %key, source = %ImageSource::MemoryCache, "Image bound");
            request.finish(&path);
            return;
        }

        request.show_loading(view.as_ref());
        let target = view.size();
        let rotation = request.rotation;
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            if !this.registry.is_current(slot, &key) {
                trace!(slot = %slot, key = %key, "Request superseded before decode");
                return;
            }
            let result = this.decode_cached(&key, &path, target, rotation).await;
            let ui = Arc::clone(&this);
            this.dispatcher.dispatch(Box::new(move || {
                ui.complete_local(slot, &key, &path, &view, request, result);
            }));
        });
    }

    async fn decode_cached(
        &self,
        key: &ImageKey,
        path: &Path,
        target: ViewSize,
        rotation: Rotation,
    ) -> Result<(P::Image, ImageSource), LoadError> {
        if let Some(image) = self.cache.peek(key) {
            return Ok((image, ImageSource::MemoryCache));
        }

        let generation = self.generation(key);
        let platform = Arc::clone(&self.platform);
        let file = path.to_path_buf();
        let decoded = self
            .runtime
            .spawn_blocking(move || platform.decode_from_path(&file, target, rotation))
            .await
            .map_err(|e| LoadError::decode(format!("decode task panicked: {e}")))??;

        let generations = self.generations.lock();
        let invalidated = generations.get(key).copied().unwrap_or(0) != generation;
        if invalidated || self.is_shut_down() {
            drop(generations);
            trace!(key = %key, invalidated, "Discarding decoded image");
            self.platform.release_image(decoded);
            return Err(LoadError::RaceDiscarded);
        }
        let image = self.cache.insert(key.clone(), decoded);
        drop(generations);
        Ok((image, ImageSource::Decoded))
    }

    fn generation(&self, key: &ImageKey) -> u64 {
        self.generations.lock().get(key).copied().unwrap_or(0)
    }

    fn complete_local(
        &self,
        slot: SlotId,
        key: &ImageKey,
        path: &Path,
        view: &SharedView<P::Image>,
        request: ViewRequest<P::Image>,
        result: Result<(P::Image, ImageSource), LoadError>,
    ) {
        if !self.registry.is_current(slot, key) {
            trace!(slot = %slot, key = %key, reason = %LoadError::RaceDiscarded, "Dropping result");
            return;
        }

        request.show_result(view.as_ref());
        match result {
            Ok((image, source)) => {
                view.set_content(Some(image));
                debug!(slot = %slot, key = %key, source = %source, "Image bound");
                request.finish(path);
            }
            Err(e) => {
                self.registry.unregister(slot);
                request.fail(key.as_str(), e);
            }
        }
    }

    async fn apply_file_placeholder(
        self: &Arc<Self>,
        slot: SlotId,
        key: &ImageKey,
        path: &Path,
        target: ViewSize,
        view: &SharedView<P::Image>,
    ) -> Option<P::Image> {
        let placeholder_key = ImageKey::from_path(path);
        let image = match self
            .decode_cached(&placeholder_key, path, target, Rotation::None)
            .await
        {
            Ok((image, _)) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Placeholder unavailable");
                return None;
            }
        };

        let this = Arc::clone(self);
        let key = key.clone();
        let view = Arc::clone(view);
        let shown = image.clone();
        self.dispatcher.dispatch(Box::new(move || {
            if this.registry.is_current(slot, &key) {
                view.set_content(Some(shown));
            }
        }));
        Some(image)
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_remote(
        self: &Arc<Self>,
        slot: SlotId,
        key: &ImageKey,
        source: &str,
        view: SharedView<P::Image>,
        request: ViewRequest<P::Image>,
        placeholder: Option<P::Image>,
        result: DownloadResult,
    ) {
        if !self.registry.is_current(slot, key) {
            trace!(slot = %slot, source, reason = %LoadError::RaceDiscarded, "Dropping download result");
            return;
        }

        match result {
            Ok(path) => self.bind_local(path, view, request, BindMode::Force),
            Err(e) => {
                self.registry.unregister(slot);
                if let Some(image) = placeholder {
                    view.set_content(Some(image));
                }
                request.fail(source, e);
            }
        }
    }
}

impl<P: ImagePlatform> Drop for ImageLoader<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use tempfile::TempDir;

    use crate::domain::ports::{MockHttpTransport, TransportResponse};
    use crate::infrastructure::dispatch::{ChannelDispatcher, UiQueue};
    use crate::infrastructure::image::memory_cache::MIN_CACHE_SIZE;
    use crate::infrastructure::image::mock::{FakeImage, FakePlatform};
    use crate::presentation::HeadlessSlot;

    struct Harness {
        dir: TempDir,
        platform: Arc<FakePlatform>,
        loader: Arc<ImageLoader<FakePlatform>>,
        queue: UiQueue,
    }

    impl Harness {
        fn file(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, name).unwrap();
            path
        }
    }

    fn harness_with(transport: MockHttpTransport, auth: Option<Arc<Authorizator>>) -> Harness {
        let dir = TempDir::new().unwrap();
        let platform = Arc::new(FakePlatform::new());
        let (dispatcher, queue) = ChannelDispatcher::new();
        let mut ports = LoaderPorts::new(
            Arc::clone(&platform),
            Arc::new(transport),
            Arc::new(dispatcher),
        );
        if let Some(auth) = auth {
            ports = ports.with_authorizator(auth);
        }
        let config = ImageLoaderConfig {
            storage_dir: dir.path().join("storage"),
            ..ImageLoaderConfig::default()
        };
        Harness {
            loader: ImageLoader::new(config, ports),
            dir,
            platform,
            queue,
        }
    }

    fn harness(transport: MockHttpTransport) -> Harness {
        harness_with(transport, None)
    }

    fn new_slot() -> (Arc<HeadlessSlot<FakeImage>>, SharedView<FakeImage>) {
        let slot = Arc::new(HeadlessSlot::new(ViewSize::new(120, 80)));
        let view: SharedView<FakeImage> = slot.clone();
        (slot, view)
    }

    #[derive(Clone, Default)]
    struct Calls {
        done: Arc<Mutex<Vec<PathBuf>>>,
        errors: Arc<Mutex<Vec<LoadError>>>,
    }

    impl Calls {
        fn request(&self) -> ViewRequest<FakeImage> {
            let done = Arc::clone(&self.done);
            let errors = Arc::clone(&self.errors);
            ViewRequest::new()
                .on_done(move |path| done.lock().push(path.to_path_buf()))
                .on_error(move |e| errors.lock().push(e))
        }
    }

    async fn drain_until(queue: &mut UiQueue, mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                queue.run_next().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn ok_transport(times: usize) -> MockHttpTransport {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .times(times)
            .returning(|_| Ok(TransportResponse::new(200, &b"remote"[..])));
        transport
    }

    #[tokio::test]
    async fn test_local_image_bound() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader
            .set_image_for_view(&path, &view, calls.request().rotation(Rotation::Half));
        drain_until(&mut h.queue, || slot.has_content()).await;

        let image = slot.content().unwrap();
        assert_eq!(image.name, "a");
        assert_eq!(image.target, ViewSize::new(120, 80));
        assert_eq!(image.rotation, Rotation::Half);
        assert_eq!(*calls.done.lock(), vec![path]);
        assert_eq!(h.loader.bound_slots(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_ignored() {
        let mut h = harness(MockHttpTransport::new());
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader
            .set_image_for_view(h.dir.path().join("nope.png"), &view, calls.request());

        assert_eq!(h.queue.run_until_idle(Duration::from_millis(50)).await, 0);
        assert!(!slot.has_content());
        assert!(slot.is_visible());
        assert_eq!(h.loader.bound_slots(), 0);
        assert!(calls.done.lock().is_empty());
        assert!(calls.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let mut h = harness(MockHttpTransport::new());
        let a = h.file("a.png");
        let b = h.file("b.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        let release_a = h.platform.hold(&a);
        h.loader.set_image_for_view(&a, &view, calls.request());
        let platform = Arc::clone(&h.platform);
        wait_for(|| platform.holds() == 0).await;

        h.loader.set_image_for_view(&b, &view, calls.request());
        drain_until(&mut h.queue, || slot.has_content()).await;
        assert_eq!(slot.content().unwrap().name, "b");

        release_a.send(()).unwrap();
        wait_for(|| platform.decode_count() == 2).await;
        h.queue.run_until_idle(Duration::from_millis(100)).await;

        assert_eq!(slot.content().unwrap().name, "b");
        assert_eq!(slot.content_changes(), 1);
        assert_eq!(*calls.done.lock(), vec![b]);
    }

    #[tokio::test]
    async fn test_unchanged_request_skips_work() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_image_for_view(&path, &view, calls.request());
        drain_until(&mut h.queue, || slot.has_content()).await;

        h.loader.set_image_for_view(&path, &view, calls.request());
        assert_eq!(h.queue.run_until_idle(Duration::from_millis(50)).await, 0);
        assert_eq!(h.platform.decode_count(), 1);
        assert_eq!(slot.content_changes(), 1);
        assert_eq!(calls.done.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_applies_immediately() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (first, first_view) = new_slot();
        let (second, second_view) = new_slot();

        h.loader
            .set_image_for_view(&path, &first_view, ViewRequest::new());
        drain_until(&mut h.queue, || first.has_content()).await;

        h.loader
            .set_image_for_view(&path, &second_view, ViewRequest::new());
        assert_eq!(second.content().unwrap().name, "a");
        assert_eq!(h.platform.decode_count(), 1);
        assert_eq!(h.loader.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_visibility_toggled_while_loading() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();
        let (spinner, spinner_view) = new_slot();
        spinner.set_visible(false);

        let release = h.platform.hold(&path);
        h.loader.set_image_for_view(
            &path,
            &view,
            ViewRequest::new().with_loader_view(&spinner_view),
        );
        assert!(!slot.is_visible());
        assert!(spinner.is_visible());

        release.send(()).unwrap();
        drain_until(&mut h.queue, || slot.has_content()).await;
        assert!(slot.is_visible());
        assert!(!spinner.is_visible());
    }

    #[tokio::test]
    async fn test_hidden_slot_stays_hidden_without_toggling() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();
        slot.set_visible(false);

        h.loader.set_image_for_view(
            &path,
            &view,
            ViewRequest::new().hide_while_loading(false),
        );
        drain_until(&mut h.queue, || slot.has_content()).await;
        assert!(!slot.is_visible());

        // Cache hits leave visibility alone too.
        let (other, other_view) = new_slot();
        other.set_visible(false);
        h.loader.set_image_for_view(
            &path,
            &other_view,
            ViewRequest::new().hide_while_loading(false),
        );
        assert!(other.has_content());
        assert!(!other.is_visible());
    }

    #[tokio::test]
    async fn test_hidden_slot_stays_hidden_on_decode_error() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("bad.png");
        h.platform.corrupt(&path);
        let (slot, view) = new_slot();
        slot.set_visible(false);
        let calls = Calls::default();

        h.loader
            .set_image_for_view(&path, &view, calls.request().hide_while_loading(false));
        let errors = Arc::clone(&calls.errors);
        drain_until(&mut h.queue, || !errors.lock().is_empty()).await;

        assert!(!slot.is_visible());
        assert!(!slot.has_content());
    }

    #[tokio::test]
    async fn test_decode_error_reported() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("bad.png");
        h.platform.corrupt(&path);
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_image_for_view(&path, &view, calls.request());
        let errors = Arc::clone(&calls.errors);
        drain_until(&mut h.queue, || !errors.lock().is_empty()).await;

        assert!(matches!(
            calls.errors.lock()[0],
            LoadError::DecodeFailure(_)
        ));
        assert!(slot.is_visible());
        assert!(!slot.has_content());
        assert_eq!(h.loader.bound_slots(), 0);
        assert!(calls.done.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_clears_slots_and_cache() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let other = h.file("b.png");
        let (first, first_view) = new_slot();
        let (second, second_view) = new_slot();
        let (third, third_view) = new_slot();

        h.loader
            .set_image_for_view(&path, &first_view, ViewRequest::new());
        drain_until(&mut h.queue, || first.has_content()).await;
        h.loader
            .set_image_for_view(&path, &second_view, ViewRequest::new());
        h.loader
            .set_image_for_view(&other, &third_view, ViewRequest::new());
        drain_until(&mut h.queue, || third.has_content()).await;

        assert_eq!(h.loader.invalidate_image(&path), 2);
        assert!(!first.has_content());
        assert!(!second.has_content());
        assert!(third.has_content());
        assert_eq!(h.loader.bound_slots(), 1);
        assert_eq!(h.platform.released(), vec!["a".to_string()]);

        // The next request decodes again.
        h.loader
            .set_image_for_view(&path, &first_view, ViewRequest::new());
        drain_until(&mut h.queue, || first.has_content()).await;
        assert_eq!(h.platform.decode_count(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_during_decode_keeps_result_out_of_cache() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        let release = h.platform.hold(&path);
        h.loader.set_image_for_view(&path, &view, calls.request());
        let platform = Arc::clone(&h.platform);
        wait_for(|| platform.holds() == 0).await;

        assert_eq!(h.loader.invalidate_image(&path), 1);
        release.send(()).unwrap();
        wait_for(|| platform.released() == vec!["a".to_string()]).await;
        h.queue.run_until_idle(Duration::from_millis(100)).await;

        assert_eq!(h.loader.cache_stats().size, 0);
        assert!(!slot.has_content());
        assert!(calls.done.lock().is_empty());
        assert!(calls.errors.lock().is_empty());

        h.loader.set_image_for_view(&path, &view, calls.request());
        drain_until(&mut h.queue, || slot.has_content()).await;
        assert_eq!(h.platform.decode_count(), 2);
        assert_eq!(h.loader.cache_stats().size, 1);
    }

    #[tokio::test]
    async fn test_remote_requests_share_download() {
        let mut h = harness(ok_transport(1));
        let (first, first_view) = new_slot();
        let (second, second_view) = new_slot();
        let calls = Calls::default();
        let source = "https://example.com/pics/cat.png";

        h.loader.set_remote_image_for_view(
            source,
            Placeholder::bundle("spinner"),
            &first_view,
            calls.request(),
        );
        h.loader.set_remote_image_for_view(
            source,
            Placeholder::bundle("spinner"),
            &second_view,
            calls.request(),
        );
        assert_eq!(first.content().unwrap().name, "bundle:spinner");

        let done = Arc::clone(&calls.done);
        drain_until(&mut h.queue, || done.lock().len() == 2).await;

        let expected = h.loader.storage_folder().join("cat.png");
        assert_eq!(*calls.done.lock(), vec![expected.clone(), expected]);
        assert_eq!(first.content().unwrap().name, "cat");
        assert_eq!(second.content().unwrap().name, "cat");
        assert!(h.loader.stored_file(source).is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_restores_placeholder() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(|_| Ok(TransportResponse::new(404, Vec::new())));
        let mut h = harness(transport);
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_remote_image_for_view(
            "https://example.com/missing.png",
            Placeholder::bundle("spinner"),
            &view,
            calls.request(),
        );
        let errors = Arc::clone(&calls.errors);
        drain_until(&mut h.queue, || !errors.lock().is_empty()).await;

        assert_eq!(
            *calls.errors.lock(),
            vec![LoadError::network("HTTP 404")]
        );
        assert_eq!(slot.content().unwrap().name, "bundle:spinner");
        assert_eq!(slot.content_changes(), 2);
        assert_eq!(h.loader.bound_slots(), 0);
    }

    #[tokio::test]
    async fn test_file_placeholder_shown_before_download() {
        let mut h = harness(ok_transport(1));
        let spinner = h.file("spinner.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_remote_image_for_view(
            "https://example.com/dog.png",
            Placeholder::file(&spinner),
            &view,
            calls.request(),
        );
        let done = Arc::clone(&calls.done);
        drain_until(&mut h.queue, || !done.lock().is_empty()).await;

        assert_eq!(slot.content().unwrap().name, "dog");
        assert_eq!(slot.content_changes(), 2);
    }

    #[tokio::test]
    async fn test_newer_request_wins_over_download() {
        let mut h = harness(ok_transport(1));
        let local = h.file("local.png");
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_remote_image_for_view(
            "https://example.com/late.png",
            Placeholder::bundle("spinner"),
            &view,
            calls.request(),
        );
        h.loader.set_image_for_view(&local, &view, calls.request());

        let done = Arc::clone(&calls.done);
        drain_until(&mut h.queue, || !done.lock().is_empty()).await;
        let loader = Arc::clone(&h.loader);
        wait_for(|| loader.stored_file("https://example.com/late.png").is_some()).await;
        h.queue.run_until_idle(Duration::from_millis(100)).await;

        assert_eq!(slot.content().unwrap().name, "local");
        assert_eq!(*calls.done.lock(), vec![local]);
    }

    #[tokio::test]
    async fn test_auth_failure_reported() {
        let mut transport = MockHttpTransport::new();
        transport.expect_get().times(0);
        let auth = Arc::new(Authorizator::new());
        auth.refresh_access_token("stale", Utc::now() - chrono::Duration::seconds(1));
        let mut h = harness_with(transport, Some(auth));
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_remote_image_for_view(
            "https://example.com/private.png",
            Placeholder::bundle("spinner"),
            &view,
            calls.request(),
        );
        let errors = Arc::clone(&calls.errors);
        drain_until(&mut h.queue, || !errors.lock().is_empty()).await;

        assert_eq!(*calls.errors.lock(), vec![LoadError::AuthFailure]);
        assert_eq!(slot.content().unwrap().name, "bundle:spinner");
    }

    #[tokio::test]
    async fn test_invalid_source_reported() {
        let mut h = harness(MockHttpTransport::new());
        let (slot, view) = new_slot();
        let calls = Calls::default();

        h.loader.set_remote_image_for_view(
            "file:///etc/passwd",
            Placeholder::bundle("spinner"),
            &view,
            calls.request(),
        );
        let errors = Arc::clone(&calls.errors);
        drain_until(&mut h.queue, || !errors.lock().is_empty()).await;

        assert!(matches!(
            calls.errors.lock()[0],
            LoadError::NetworkFailure(_)
        ));
        assert_eq!(slot.content().unwrap().name, "bundle:spinner");
    }

    #[tokio::test]
    async fn test_set_placeholder_unbinds_slot() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();

        h.loader.set_image_for_view(&path, &view, ViewRequest::new());
        drain_until(&mut h.queue, || slot.has_content()).await;

        h.loader.set_placeholder_for_view("empty", &view).unwrap();
        assert_eq!(slot.content().unwrap().name, "bundle:empty");
        assert_eq!(h.loader.bound_slots(), 0);
        assert!(matches!(
            h.loader.set_placeholder_for_view("missing-asset", &view),
            Err(LoadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_max_cache_size_clamped() {
        let h = harness(MockHttpTransport::new());
        assert_eq!(h.loader.set_max_cache_size(1), MIN_CACHE_SIZE);
        assert_eq!(h.loader.set_max_cache_size(64), 64);
        assert_eq!(h.loader.cache_stats().capacity, 64);
    }

    #[tokio::test]
    async fn test_shutdown_releases_cache() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        let (slot, view) = new_slot();

        h.loader.set_image_for_view(&path, &view, ViewRequest::new());
        drain_until(&mut h.queue, || slot.has_content()).await;

        h.loader.shutdown();
        assert_eq!(h.platform.released(), vec!["a".to_string()]);
        assert_eq!(h.loader.cache_stats().size, 0);

        let (other, other_view) = new_slot();
        h.loader
            .set_image_for_view(&path, &other_view, ViewRequest::new());
        assert_eq!(h.queue.run_until_idle(Duration::from_millis(50)).await, 0);
        assert!(!other.has_content());
    }

    #[tokio::test]
    async fn test_dropped_views_are_forgotten() {
        let mut h = harness(MockHttpTransport::new());
        let path = h.file("a.png");
        {
            let (slot, view) = new_slot();
            h.loader.set_image_for_view(&path, &view, ViewRequest::new());
            drain_until(&mut h.queue, || slot.has_content()).await;
        }
        assert_eq!(h.loader.bound_slots(), 1);

        let (_other, other_view) = new_slot();
        h.loader
            .set_image_for_view(&path, &other_view, ViewRequest::new());
        assert_eq!(h.loader.bound_slots(), 1);
    }
}
