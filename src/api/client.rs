//! HTTP implementation of the remote-store capability.
//!
//! URL templates and field names follow the pan web frontend. Mutating
//! calls carry the CSRF token (`bdstoken`) obtained during login; the
//! identity cookies travel in the shared cookie store.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::api::types::{ApiResult, FileManagerResult, ListResult, QuotaResult};
use crate::error::{PanError, Result};
use crate::fs::path::split_path;
use crate::fs::{FileInfo, Quota};
use crate::http::HttpClient;
use crate::store::{ByteStream, RemoteStore};

const PAN_API_URL: &str = "https://pan.baidu.com/api/";
const PCS_URL: &str = "https://pcs.baidu.com/rest/2.0/pcs/";

/// Application id the PCS endpoints expect.
const PCS_APP_ID: &str = "250528";

const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";
const UPLOAD_SLICE_MD5_HEADER: &str = "Content-MD5";

/// Percent-encode a value for substitution into a URL template.
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Find a listing entry by name, matching case-insensitively the way the
/// service matches names elsewhere.
pub(crate) fn find_entry<'a>(entries: &'a [FileInfo], name: &str) -> Option<&'a FileInfo> {
    entries
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Remote store backed by the pan HTTP API.
pub struct PanStore {
    http: HttpClient,
    bds_token: String,
}

impl PanStore {
    pub(crate) fn new(http: HttpClient, bds_token: String) -> Self {
        Self { http, bds_token }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST to the `filemanager` endpoint, which wraps delete, copy,
    /// move and rename behind one form parameter.
    async fn file_manager(&self, opera: &str, item: serde_json::Value) -> Result<()> {
        let url = format!(
            "{}filemanager?opera={}&bdstoken={}",
            PAN_API_URL,
            opera,
            encode(&self.bds_token)
        );
        let filelist = serde_json::to_string(&json!([item]))?;
        debug!(opera, "file manager request");

        let response = self.http.post_form(&url, &[("filelist", &filelist)]).await?;
        let result: FileManagerResult = Self::parse_json(response).await?;

        let first = result
            .info
            .as_ref()
            .and_then(|items| items.first())
            .ok_or_else(|| PanError::format("file manager response missing result list"))?;
        if first.errno != 0 {
            return Err(PanError::api(first.errno));
        }
        if result.errno != 0 {
            return Err(PanError::api(result.errno));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for PanStore {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let url = format!("{}list?web=1&dir={}", PAN_API_URL, encode(path));
        debug!(path, "listing directory");

        let response = self.http.get(&url).await?;
        let result: ListResult = Self::parse_json(response).await?;
        if result.errno != 0 {
            return Err(PanError::api(result.errno));
        }
        let list = result
            .list
            .ok_or_else(|| PanError::format("listing response missing file list"))?;
        Ok(list.into_iter().map(|entry| entry.into_file_info()).collect())
    }

    async fn get_info(&self, path: &str) -> Result<FileInfo> {
        let (dir, name) = split_path(path);
        let entries = self.list(dir).await?;
        find_entry(&entries, name)
            .cloned()
            .ok_or_else(|| PanError::NotFound(path.to_string()))
    }

    async fn search(&self, path: &str, key: &str, recursive: bool) -> Result<Vec<FileInfo>> {
        let mut url = format!(
            "{}search?dir={}&key={}",
            PAN_API_URL,
            encode(path),
            encode(key)
        );
        if recursive {
            url.push_str("&recursion");
        }
        debug!(path, key, recursive, "searching");

        let response = self.http.get(&url).await?;
        let result: ListResult = Self::parse_json(response).await?;
        if result.errno != 0 {
            return Err(PanError::api(result.errno));
        }
        let list = result
            .list
            .ok_or_else(|| PanError::format("search response missing file list"))?;
        Ok(list.into_iter().map(|entry| entry.into_file_info()).collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.file_manager("delete", json!(path)).await
    }

    async fn copy_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.file_manager(
            "copy",
            json!({ "path": path, "dest": dest, "newname": new_name }),
        )
        .await
    }

    async fn move_item(&self, path: &str, dest: &str, new_name: &str) -> Result<()> {
        self.file_manager(
            "move",
            json!({ "path": path, "dest": dest, "newname": new_name }),
        )
        .await
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        self.file_manager("rename", json!({ "path": path, "newname": new_name }))
            .await
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let url = format!("{}create?bdstoken={}", PAN_API_URL, encode(&self.bds_token));
        debug!(path, "creating directory");

        let response = self
            .http
            .post_form(&url, &[("isdir", "1"), ("path", path)])
            .await?;
        let result: ApiResult = Self::parse_json(response).await?;
        if result.errno != 0 {
            return Err(PanError::api(result.errno));
        }
        Ok(())
    }

    async fn download(&self, path: &str, range: Option<&str>) -> Result<ByteStream> {
        let url = format!(
            "{}file?method=download&app_id={}&path={}",
            PCS_URL,
            PCS_APP_ID,
            encode(path)
        );
        debug!(path, ?range, "downloading");

        let response = self.http.get_range(&url, range).await?;
        Ok(response.bytes_stream().map_err(PanError::from).boxed())
    }

    async fn upload(&self, path: &str, overwrite: bool, data: Bytes) -> Result<()> {
        let (_, name) = split_path(path);
        let url = if overwrite {
            format!(
                "{}file?method=upload&ondup=overwrite&app_id={}&path={}",
                PCS_URL,
                PCS_APP_ID,
                encode(path)
            )
        } else {
            format!(
                "{}file?method=upload&app_id={}&path={}",
                PCS_URL,
                PCS_APP_ID,
                encode(path)
            )
        };
        debug!(path, overwrite, bytes = data.len(), "uploading");

        let part = reqwest::multipart::Part::stream(data)
            .file_name(name.to_string())
            .mime_str(UPLOAD_CONTENT_TYPE)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        self.http.post_multipart(&url, form).await?;
        Ok(())
    }

    async fn upload_slice(&self, data: Bytes) -> Result<String> {
        let url = format!(
            "{}file?method=upload&type=tmpfile&app_id={}",
            PCS_URL, PCS_APP_ID
        );
        debug!(bytes = data.len(), "uploading slice");

        // The slice endpoint ignores the file name.
        let part = reqwest::multipart::Part::stream(data)
            .file_name("foo")
            .mime_str(UPLOAD_CONTENT_TYPE)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.http.post_multipart(&url, form).await?;

        let md5 = response
            .headers()
            .get(UPLOAD_SLICE_MD5_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| PanError::format("slice upload response missing Content-MD5"))?;
        if !crate::api::hex_128bit().is_match(md5) {
            return Err(PanError::format("slice hash is not a 32-char hex value"));
        }
        Ok(md5.to_string())
    }

    async fn concat_slices(&self, path: &str, overwrite: bool, slices: &[String]) -> Result<()> {
        let mut url = format!(
            "{}file?method=createsuperfile&app_id={}&path={}",
            PCS_URL,
            PCS_APP_ID,
            encode(path)
        );
        if overwrite {
            url.push_str("&ondup=overwrite");
        }
        debug!(path, slices = slices.len(), "concatenating slices");

        let param = serde_json::to_string(&json!({ "list": slices }))?;
        self.http.post_form(&url, &[("param", &param)]).await?;
        Ok(())
    }

    async fn quota(&self) -> Result<Quota> {
        let url = format!("{}quota", PAN_API_URL);
        let response = self.http.get(&url).await?;
        let result: QuotaResult = Self::parse_json(response).await?;
        if result.errno != 0 {
            return Err(PanError::api(result.errno));
        }
        match (result.total, result.used) {
            (Some(total), Some(used)) => Ok(Quota { total, used }),
            _ => Err(PanError::format("quota response missing total or used")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            is_dir: false,
            is_empty_dir: None,
            ctime: 0,
            mtime: 0,
            size: 1,
        }
    }

    #[test]
    fn test_find_entry_is_case_insensitive() {
        let entries = vec![file("Report.PDF"), file("notes.txt")];
        assert!(find_entry(&entries, "report.pdf").is_some());
        assert!(find_entry(&entries, "NOTES.TXT").is_some());
        assert!(find_entry(&entries, "missing").is_none());
    }

    #[test]
    fn test_encode_escapes_path_characters() {
        assert_eq!(encode("/a b/c"), "%2Fa+b%2Fc");
        assert_eq!(encode("key=value&x"), "key%3Dvalue%26x");
    }
}
