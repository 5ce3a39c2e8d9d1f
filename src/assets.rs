//! Product image loading and caching.
//!
//! Loads are deduplicated per id: the first caller starts the fetch and
//! registers a shared handle, later callers attach to it, and every waiter
//! sees the same outcome. Successful loads stay cached for the life of the
//! cache. Failures are not cached, so the next reference retries.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::types::AssetDimensions;

/// A decoded, immutable product image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductAsset {
    pub id: String,
    pub image: RgbaImage,
}

impl ProductAsset {
    pub fn new(id: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: id.into(),
            image,
        }
    }

    /// Decode an encoded image (PNG, JPEG) into an asset.
    pub fn decode(id: &str, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| Error::AssetLoad {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(id, image.to_rgba8()))
    }

    pub fn dimensions(&self) -> AssetDimensions {
        let (width, height) = self.image.dimensions();
        AssetDimensions::new(width, height)
    }
}

/// Where encoded product images come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the encoded bytes for `id`.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>>;
}

/// Reads `<root>/<id>.png` from the local filesystem.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.png"))
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(id);
        tokio::fs::read(&path).await.map_err(|e| Error::AssetLoad {
            id: id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<ProductAsset>>>>;

struct CacheState {
    source: Arc<dyn AssetSource>,
    ready: Mutex<HashMap<String, Arc<ProductAsset>>>,
    // Lock order: `in_flight` before `ready`.
    in_flight: Mutex<HashMap<String, SharedLoad>>,
    failures: Mutex<HashMap<String, Error>>,
    // Ids whose last load failed; repeat failures log quietly.
    failing: Mutex<HashSet<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of a [`AssetCache::preload`] pass.
#[derive(Debug, Default)]
pub struct PreloadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<Error>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Memoizing, deduplicating product image cache. Cheap to clone; clones
/// share the same entries.
#[derive(Clone)]
pub struct AssetCache {
    state: Arc<CacheState>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            state: Arc::new(CacheState {
                source,
                ready: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Cached asset for `id`, without waiting.
    pub fn get(&self, id: &str) -> Option<Arc<ProductAsset>> {
        lock(&self.state.ready).get(id).cloned()
    }

    pub fn is_loading(&self, id: &str) -> bool {
        lock(&self.state.in_flight).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.state.ready).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load `id`, joining an in-flight load when there is one.
    pub async fn load(&self, id: &str) -> Result<Arc<ProductAsset>> {
        if let Some(asset) = self.get(id) {
            return Ok(asset);
        }

        let pending = {
            let mut in_flight = lock(&self.state.in_flight);
            // A load may have settled between the lookup above and taking the lock.
            if let Some(asset) = self.get(id) {
                return Ok(asset);
            }
            in_flight
                .entry(id.to_string())
                .or_insert_with(|| self.start(id))
                .clone()
        };
        pending.await
    }

    /// Register a load for `id`. Called with the `in_flight` lock held.
    ///
    /// On a tokio runtime the load is also driven by its own task, so it
    /// settles even when every waiter is dropped.
    fn start(&self, id: &str) -> SharedLoad {
        lock(&self.state.failures).remove(id);
        debug!(id, "starting asset load");

        let state = Arc::clone(&self.state);
        let id = id.to_string();
        let load = async move {
            let result = fetch_and_decode(state.source.as_ref(), &id).await;

            let mut in_flight = lock(&state.in_flight);
            match &result {
                Ok(asset) => {
                    lock(&state.ready).insert(id.clone(), Arc::clone(asset));
                    lock(&state.failing).remove(&id);
                    debug!(id = %id, width = asset.image.width(), height = asset.image.height(), "asset loaded");
                }
                Err(e) => {
                    if lock(&state.failing).insert(id.clone()) {
                        error!(id = %id, error = %e, "asset load failed");
                    } else {
                        debug!(id = %id, error = %e, "asset load failed again");
                    }
                    lock(&state.failures).insert(id.clone(), e.clone());
                }
            }
            in_flight.remove(&id);
            result
        }
        .boxed()
        .shared();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(load.clone().map(|_| ()));
        }
        load
    }

    /// Make sure `id` is cached or being loaded, without waiting.
    ///
    /// Must be called from within a tokio runtime; the load runs as a
    /// spawned task.
    pub fn request(&self, id: &str) {
        if self.get(id).is_some() {
            return;
        }
        if let Err(e) = tokio::runtime::Handle::try_current() {
            warn!(id, error = %e, "no async runtime, cannot load asset in background");
            return;
        }
        let mut in_flight = lock(&self.state.in_flight);
        if self.get(id).is_some() {
            return;
        }
        in_flight
            .entry(id.to_string())
            .or_insert_with(|| self.start(id));
    }

    /// The last background failure for `id`, reported once.
    pub fn take_failure(&self, id: &str) -> Option<Error> {
        lock(&self.state.failures).remove(id)
    }

    /// Load every id and wait for all of them to settle. Failures are
    /// collected, not propagated; failed ids are retried on next use.
    pub async fn preload<I, S>(&self, ids: I) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        let results = join_all(ids.iter().map(|id| self.load(id))).await;

        let mut report = PreloadReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(_) => report.loaded.push(id),
                Err(e) => {
                    // Preload failures are expected to be retried lazily.
                    self.take_failure(&id);
                    report.failed.push(e);
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "asset preload finished"
        );
        report
    }
}

async fn fetch_and_decode(source: &dyn AssetSource, id: &str) -> Result<Arc<ProductAsset>> {
    let bytes = source.fetch(id).await.map_err(|e| as_load_error(id, e))?;
    let owned_id = id.to_string();
    let asset = tokio::task::spawn_blocking(move || ProductAsset::decode(&owned_id, &bytes))
        .await
        .map_err(|e| Error::AssetLoad {
            id: id.to_string(),
            reason: e.to_string(),
        })??;
    Ok(Arc::new(asset))
}

fn as_load_error(id: &str, e: Error) -> Error {
    match e {
        Error::AssetLoad { .. } => e,
        other => Error::AssetLoad {
            id: id.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Serves a small PNG for every id except `missing`, counting fetches.
    #[derive(Default)]
    pub struct CountingSource {
        pub fetches: AtomicUsize,
    }

    #[async_trait]
    impl AssetSource for CountingSource {
        async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Stay pending for a poll so concurrent callers can attach.
            tokio::task::yield_now().await;
            match id {
                "missing" => Err(Error::Io(format!("{id} not found"))),
                "corrupt" => Ok(b"not an image".to_vec()),
                _ => Ok(png_bytes(8, 4)),
            }
        }
    }

    fn counting_cache() -> (Arc<CountingSource>, AssetCache) {
        let source = Arc::new(CountingSource::default());
        let cache = AssetCache::new(source.clone());
        (source, cache)
    }

    /// Takes a while to answer, and fails while `fail` is set.
    #[derive(Default)]
    struct SlowSource {
        fetches: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl AssetSource for SlowSource {
        async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Io(format!("{id} unavailable")));
            }
            Ok(png_bytes(4, 4))
        }
    }

    async fn wait_until(mut ready: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if ready() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ready()
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (source, cache) = counting_cache();

        let (a, b) = tokio::join!(cache.load("hat1"), cache.load("hat1"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.dimensions(), AssetDimensions::new(8, 4));
        assert!(!cache.is_loading("hat1"));
    }

    #[tokio::test]
    async fn cached_asset_is_not_refetched() {
        let (source, cache) = counting_cache();
        let first = cache.load("glasses1").await.unwrap();
        let second = cache.load("glasses1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_failures_are_shared_then_retried() {
        let (source, cache) = counting_cache();

        let (a, b) = tokio::join!(cache.load("missing"), cache.load("missing"));
        for result in [a, b] {
            match result {
                Err(Error::AssetLoad { id, .. }) => assert_eq!(id, "missing"),
                other => panic!("expected AssetLoad, got {:?}", other),
            }
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(cache.get("missing").is_none());

        assert!(cache.load("missing").await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn undecodable_bytes_fail_to_load() {
        let (_, cache) = counting_cache();
        assert!(matches!(
            cache.load("corrupt").await,
            Err(Error::AssetLoad { .. })
        ));
    }

    #[tokio::test]
    async fn preload_collects_failures() {
        let (_, cache) = counting_cache();
        let report = cache.preload(["glasses1", "missing", "hat1"]).await;

        assert_eq!(report.loaded, vec!["glasses1", "hat1"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        assert!(cache.get("missing").is_none());
        assert!(cache.take_failure("missing").is_none());
    }

    #[tokio::test]
    async fn background_request_populates_cache() {
        let (_, cache) = counting_cache();
        cache.request("hat2");
        assert!(cache.get("hat2").is_none());

        for _ in 0..200 {
            if cache.get("hat2").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cache.get("hat2").is_some());
    }

    #[tokio::test]
    async fn background_failure_is_reported_once() {
        let (_, cache) = counting_cache();
        cache.request("missing");

        let mut failure = None;
        for _ in 0..200 {
            failure = cache.take_failure("missing");
            if failure.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(failure, Some(Error::AssetLoad { .. })));
        assert!(cache.take_failure("missing").is_none());
    }

    #[tokio::test]
    async fn filesystem_source_resolves_by_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hat1.png"), png_bytes(6, 3)).unwrap();

        let cache = AssetCache::new(Arc::new(FsAssetSource::new(dir.path())));
        let asset = cache.load("hat1").await.unwrap();
        assert_eq!(asset.id, "hat1");
        assert_eq!(asset.dimensions(), AssetDimensions::new(6, 3));

        match cache.load("hat2").await {
            Err(Error::AssetLoad { id, reason }) => {
                assert_eq!(id, "hat2");
                assert!(reason.contains("hat2.png"));
            }
            other => panic!("expected AssetLoad, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn abandoned_load_still_settles() {
        let source = Arc::new(SlowSource::default());
        let cache = AssetCache::new(source.clone());

        let waited = tokio::time::timeout(Duration::from_millis(10), cache.load("hat1")).await;
        assert!(waited.is_err());
        assert!(cache.is_loading("hat1"));

        cache.request("hat1");
        assert!(wait_until(|| cache.get("hat1").is_some()).await);
        assert!(!cache.is_loading("hat1"));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeat_failures_are_tracked_until_success() {
        let source = Arc::new(SlowSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let cache = AssetCache::new(source.clone());

        assert!(cache.load("hat1").await.is_err());
        assert!(cache.load("hat1").await.is_err());
        assert_eq!(lock(&cache.state.failing).len(), 1);
        assert!(lock(&cache.state.failing).contains("hat1"));

        source.fail.store(false, Ordering::SeqCst);
        cache.load("hat1").await.unwrap();
        assert!(lock(&cache.state.failing).is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
