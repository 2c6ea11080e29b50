//! The remote-store capability consumed by the client facade.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::fs::{FileInfo, Quota};

/// A stream of downloaded file bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// File and quota operations against an authenticated remote service.
///
/// Every method either returns a domain result or raises a coded error;
/// all of them require the session to have been established first. The
/// production implementation is [`crate::api::PanStore`]; the trait exists
/// so the caching layer wraps a capability chosen at construction time.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List all files and directories contained in a directory.
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Get information about a single file or directory.
    async fn get_info(&self, path: &str) -> Result<FileInfo>;

    /// Search files and directories under a directory by keyword.
    async fn search(&self, path: &str, key: &str, recursive: bool) -> Result<Vec<FileInfo>>;

    /// Delete a file or a directory.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Copy a file or directory into `dest` under a new name.
    async fn copy_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()>;

    /// Move a file or directory into `dest` under a new name.
    async fn move_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()>;

    /// Rename a file or directory in place.
    async fn rename(&self, path: &str, new_name: &str) -> Result<()>;

    /// Create a directory, including missing parents.
    async fn create_directory(&self, path: &str) -> Result<()>;

    /// Download a file, optionally restricted to a byte range
    /// (e.g. `"bytes=0-1023"`).
    async fn download(&self, path: &str, range: Option<&str>) -> Result<ByteStream>;

    /// Upload a file.
    async fn upload(&self, path: &str, overwrite: bool, data: Bytes) -> Result<()>;

    /// Upload one slice of a file, returning its MD5 hash.
    async fn upload_slice(&self, data: Bytes) -> Result<String>;

    /// Concatenate previously uploaded slices into a complete file.
    ///
    /// `slices` holds the MD5 hashes returned by [`Self::upload_slice`]
    /// and should contain at least two elements.
    async fn concat_slices(&self, path: &str, overwrite: bool, slices: &[String]) -> Result<()>;

    /// Get storage quota information.
    async fn quota(&self) -> Result<Quota>;
}
