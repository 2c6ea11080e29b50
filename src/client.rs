//! High-level client facade.
//!
//! [`PanClient`] ties a logged-in [`Session`] to a cached view of the
//! remote store. Read operations (listing, info, quota) are answered from
//! the cache where possible; mutating operations go straight to the
//! service and then drop exactly the cached views they made stale.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::api::PanStore;
use crate::cache::ResponseCache;
use crate::error::{PanError, Result};
use crate::fs::path::{join_path, split_path};
use crate::fs::{FileInfo, Quota};
use crate::session::{CaptchaSolver, Session};
use crate::store::{ByteStream, RemoteStore};

const QUOTA_KEY: &str = "quota";

fn list_key(path: &str) -> String {
    format!("{}$list", path)
}

fn info_key(path: &str) -> String {
    format!("{}$info", path)
}

fn search_key(path: &str, key: &str, recursive: bool) -> String {
    format!("{}$search${}${}", path, key, recursive)
}

/// The prefixes under which every cached view of `path` itself lives:
/// its own entries plus everything below it.
fn own_prefixes(path: &str) -> [String; 2] {
    [format!("{}$", path), format!("{}/", path)]
}

/// Value type of the shared response cache. One cache holds the mixed
/// key space, so invalidation prefixes cut across operation kinds.
#[derive(Clone)]
enum CacheValue {
    Files(Vec<FileInfo>),
    Info(FileInfo),
    Quota(Quota),
}

impl CacheValue {
    fn into_files(self) -> Result<Vec<FileInfo>> {
        match self {
            CacheValue::Files(files) => Ok(files),
            _ => Err(PanError::format("cache entry is not a file list")),
        }
    }

    fn into_info(self) -> Result<FileInfo> {
        match self {
            CacheValue::Info(info) => Ok(info),
            _ => Err(PanError::format("cache entry is not a file info")),
        }
    }

    fn into_quota(self) -> Result<Quota> {
        match self {
            CacheValue::Quota(quota) => Ok(quota),
            _ => Err(PanError::format("cache entry is not a quota")),
        }
    }
}

/// Tuning knobs for [`PanClient`].
#[derive(Debug, Clone)]
pub struct PanOptions {
    /// How long resolved read results stay valid.
    pub cache_ttl: Duration,
    /// Whether search results are cached too. Off by default: search
    /// results go stale in ways path-prefix invalidation cannot track.
    pub cache_search: bool,
}

impl Default for PanOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            cache_search: false,
        }
    }
}

/// Store wrapper adding the response cache and its invalidation rules.
struct CachedStore {
    store: Arc<dyn RemoteStore>,
    cache: ResponseCache<CacheValue>,
    cache_search: bool,
}

impl CachedStore {
    fn new(store: Arc<dyn RemoteStore>, options: &PanOptions) -> Self {
        Self {
            store,
            cache: ResponseCache::new(options.cache_ttl),
            cache_search: options.cache_search,
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let store = self.store.clone();
        let owned = path.to_string();
        self.cache
            .get(&list_key(path), move || async move {
                store.list(&owned).await.map(CacheValue::Files)
            })
            .await?
            .into_files()
    }

    async fn get_info(&self, path: &str) -> Result<FileInfo> {
        let store = self.store.clone();
        let owned = path.to_string();
        self.cache
            .get(&info_key(path), move || async move {
                store.get_info(&owned).await.map(CacheValue::Info)
            })
            .await?
            .into_info()
    }

    async fn search(&self, path: &str, key: &str, recursive: bool) -> Result<Vec<FileInfo>> {
        if !self.cache_search {
            return self.store.search(path, key, recursive).await;
        }
        let store = self.store.clone();
        let owned_path = path.to_string();
        let owned_key = key.to_string();
        self.cache
            .get(&search_key(path, key, recursive), move || async move {
                store
                    .search(&owned_path, &owned_key, recursive)
                    .await
                    .map(CacheValue::Files)
            })
            .await?
            .into_files()
    }

    async fn quota(&self) -> Result<Quota> {
        let store = self.store.clone();
        self.cache
            .get(QUOTA_KEY, move || async move {
                store.quota().await.map(CacheValue::Quota)
            })
            .await?
            .into_quota()
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.store.delete(path).await?;
        let (dir, _) = split_path(path);
        let [own_dollar, own_slash] = own_prefixes(path);
        self.cache
            .invalidate([format!("{}$", dir), own_slash, own_dollar])
            .await;
        Ok(())
    }

    async fn copy_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.store.copy_item(path, dest, new_name).await?;
        self.invalidate_transfer(path, dest, new_name).await;
        Ok(())
    }

    async fn move_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.store.move_item(path, dest, new_name).await?;
        self.invalidate_transfer(path, dest, new_name).await;
        Ok(())
    }

    /// Shared invalidation for copy and move: both the source's views and
    /// every view of the destination path become stale.
    async fn invalidate_transfer(&self, path: &str, dest: &str, new_name: &str) {
        let (dir, _) = split_path(path);
        let new_path = join_path(dest, new_name);
        let [own_dollar, own_slash] = own_prefixes(path);
        let [new_dollar, new_slash] = own_prefixes(&new_path);
        self.cache
            .invalidate([
                format!("{}$", dir),
                own_slash,
                own_dollar,
                format!("{}$", dest),
                new_dollar,
                new_slash,
            ])
            .await;
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        self.store.rename(path, new_name).await?;
        let (dir, _) = split_path(path);
        let new_path = join_path(dir, new_name);
        let [own_dollar, own_slash] = own_prefixes(path);
        let [new_dollar, new_slash] = own_prefixes(&new_path);
        self.cache
            .invalidate([
                format!("{}$", dir),
                own_slash,
                own_dollar,
                new_dollar,
                new_slash,
            ])
            .await;
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        self.store.create_directory(path).await?;
        let (dir, _) = split_path(path);
        let [own_dollar, own_slash] = own_prefixes(path);
        self.cache
            .invalidate([format!("{}$", dir), own_slash, own_dollar])
            .await;
        Ok(())
    }

    async fn download(&self, path: &str, range: Option<&str>) -> Result<ByteStream> {
        self.store.download(path, range).await
    }

    async fn upload(&self, path: &str, overwrite: bool, data: Bytes) -> Result<()> {
        self.store.upload(path, overwrite, data).await?;
        self.invalidate_new_file(path).await;
        Ok(())
    }

    async fn upload_slice(&self, data: Bytes) -> Result<String> {
        self.store.upload_slice(data).await
    }

    async fn concat_slices(&self, path: &str, overwrite: bool, slices: &[String]) -> Result<()> {
        self.store.concat_slices(path, overwrite, slices).await?;
        self.invalidate_new_file(path).await;
        Ok(())
    }

    /// A file appeared at `path`: the parent listing and any cached view
    /// of that path are stale. Nothing can live below a file.
    async fn invalidate_new_file(&self, path: &str) {
        let (dir, _) = split_path(path);
        self.cache
            .invalidate([format!("{}$", dir), format!("{}$", path)])
            .await;
    }
}

/// Authenticated, caching client for the pan service.
///
/// Cheap reads are served from a TTL cache with request coalescing; every
/// mutation invalidates the cached views it affects, so a read issued
/// after a mutation returns never observes the pre-mutation state.
pub struct PanClient {
    session: Session,
    cached: CachedStore,
}

impl PanClient {
    /// Log in with default [`PanOptions`].
    pub async fn login(
        username: &str,
        password: &str,
        captcha_solver: Option<&CaptchaSolver>,
    ) -> Result<Self> {
        Self::login_with_options(username, password, captcha_solver, PanOptions::default()).await
    }

    /// Log in with explicit options.
    pub async fn login_with_options(
        username: &str,
        password: &str,
        captcha_solver: Option<&CaptchaSolver>,
        options: PanOptions,
    ) -> Result<Self> {
        let session = Session::login(username, password, captcha_solver).await?;
        let store = PanStore::new(session.http().clone(), session.bds_token().to_string());
        let cached = CachedStore::new(Arc::new(store), &options);
        Ok(Self { session, cached })
    }

    /// The username this client is logged in as.
    pub fn username(&self) -> &str {
        self.session.username()
    }

    /// The TTL applied to cached read results.
    pub fn cache_ttl(&self) -> Duration {
        self.cached.cache.ttl()
    }

    /// List all files and directories contained in a directory.
    pub async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        self.cached.list(path).await
    }

    /// Get information about a single file or directory.
    pub async fn get_info(&self, path: &str) -> Result<FileInfo> {
        self.cached.get_info(path).await
    }

    /// Search files and directories under a directory by keyword.
    pub async fn search(&self, path: &str, key: &str, recursive: bool) -> Result<Vec<FileInfo>> {
        self.cached.search(path, key, recursive).await
    }

    /// Delete a file or a directory.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.cached.delete(path).await
    }

    /// Copy a file or directory into `dest` under a new name.
    pub async fn copy_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.cached.copy_item(path, dest, new_name).await
    }

    /// Move a file or directory into `dest` under a new name.
    pub async fn move_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.cached.move_item(path, dest, new_name).await
    }

    /// Rename a file or directory in place.
    pub async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        self.cached.rename(path, new_name).await
    }

    /// Create a directory, including missing parents.
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        self.cached.create_directory(path).await
    }

    /// Download a file, optionally restricted to a byte range
    /// (e.g. `"bytes=0-1023"`). Downloads are never cached.
    pub async fn download(&self, path: &str, range: Option<&str>) -> Result<ByteStream> {
        self.cached.download(path, range).await
    }

    /// Upload a file in one request.
    pub async fn upload(&self, path: &str, overwrite: bool, data: Bytes) -> Result<()> {
        self.cached.upload(path, overwrite, data).await
    }

    /// Upload one slice of a large file, returning its hash.
    pub async fn upload_slice(&self, data: Bytes) -> Result<String> {
        self.cached.upload_slice(data).await
    }

    /// Concatenate previously uploaded slices into a complete file.
    pub async fn concat_slices(
        &self,
        path: &str,
        overwrite: bool,
        slices: &[String],
    ) -> Result<()> {
        self.cached.concat_slices(path, overwrite, slices).await
    }

    /// Get storage quota information.
    pub async fn quota(&self) -> Result<Quota> {
        self.cached.quota().await
    }

    /// Drop every cached result.
    pub async fn clear_cache(&self) {
        self.cached.cache.reset().await;
    }

    /// Drop every cached result concerning `path` or anything below it.
    pub async fn clear_cache_for(&self, path: &str) {
        self.cached.cache.invalidate(own_prefixes(path)).await;
    }

    /// Log out and consume the client.
    pub async fn close(self) -> Result<()> {
        debug!(username = %self.session.username(), "closing client");
        self.session.logout().await
    }
}
