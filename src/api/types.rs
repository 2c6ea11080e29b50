//! Wire-format response shapes.

use serde::Deserialize;

use crate::fs::FileInfo;

/// Envelope shared by every pan API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResult {
    #[serde(default)]
    pub errno: i32,
}

/// Response of the `list` and `search` endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResult {
    #[serde(default)]
    pub errno: i32,
    pub list: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileEntry {
    pub server_filename: String,
    pub server_ctime: i64,
    pub server_mtime: i64,
    pub isdir: i32,
    /// Only reported for directories.
    pub dir_empty: Option<i32>,
    pub size: u64,
}

impl FileEntry {
    pub(crate) fn into_file_info(self) -> FileInfo {
        FileInfo {
            name: self.server_filename,
            is_dir: self.isdir != 0,
            is_empty_dir: self.dir_empty.map(|v| v != 0),
            ctime: self.server_ctime,
            mtime: self.server_mtime,
            size: self.size,
        }
    }
}

/// Response of the `filemanager` endpoint: an outer code plus one
/// per-item code.
#[derive(Debug, Deserialize)]
pub(crate) struct FileManagerResult {
    #[serde(default)]
    pub errno: i32,
    pub info: Option<Vec<ApiResult>>,
}

/// Response of the `quota` endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct QuotaResult {
    #[serde(default)]
    pub errno: i32,
    pub total: Option<u64>,
    pub used: Option<u64>,
}

/// Response of the passport login-token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginTokenResult {
    #[serde(rename = "errInfo")]
    pub error_info: LoginTokenErrorInfo,
    /// Absent when the endpoint reports an error.
    pub data: Option<LoginTokenData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginTokenErrorInfo {
    pub no: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginTokenData {
    pub token: String,
}
