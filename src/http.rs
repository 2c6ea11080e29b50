//! HTTP client wrapper for requests to the pan service.
//!
//! All requests for one session share a single cookie store; the identity
//! cookies obtained during login authorize every later call. Failures are
//! surfaced once, with no transport-level retry.

use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};

use crate::error::{PanError, Result};

/// User agent sent on every request. The passport endpoints refuse
/// requests that do not look like a desktop browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/56.0.2924.67 Safari/537.36";

/// HTTP client with a shared cookie store.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with cookie handling enabled.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PanError::Request(format!("failed to build client: {}", e)))?;

        Ok(Self { client })
    }

    /// Make a GET request, requiring a 200 response.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        check_status(response, false)
    }

    /// Make a GET request with an optional `Range` header, admitting
    /// 206 Partial Content in addition to 200.
    pub async fn get_range(&self, url: &str, range: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range);
        }
        let response = request.send().await?;
        check_status(response, true)
    }

    /// Make a GET request and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    /// Make a GET request and return the body as raw bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        Ok(self.get(url).await?.bytes().await?)
    }

    /// POST a form-urlencoded body.
    pub async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        let response = self.client.post(url).form(params).send().await?;
        check_status(response, false)
    }

    /// POST a multipart form.
    pub async fn post_multipart(
        &self,
        url: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Response> {
        let response = self.client.post(url).multipart(form).send().await?;
        check_status(response, false)
    }
}

fn check_status(response: Response, allow_partial_content: bool) -> Result<Response> {
    let status = response.status();
    let ok = status == StatusCode::OK
        || (allow_partial_content && status == StatusCode::PARTIAL_CONTENT);
    if ok {
        Ok(response)
    } else {
        Err(PanError::Http(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }
}
