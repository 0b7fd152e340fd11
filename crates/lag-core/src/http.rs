//! Shared HTTP plumbing for provider crates.
//!
//! [`HttpClient`] wraps a [`reqwest::Client`] with a per-request timeout and
//! maps transport failures, non-success statuses and empty bodies to
//! [`LagError::UpstreamUnavailable`] tagged with the provider name.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::{LagError, Result},
    picture,
    types::Picture,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request.
const USER_AGENT: &str = concat!("lag/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one provider.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    provider: String,
}

impl HttpClient {
    /// Create a client with the default timeout.
    ///
    /// # Errors
    /// Returns [`LagError::InvalidParameter`] if the TLS backend cannot be
    /// initialised.
    pub fn new(provider: impl Into<String>) -> Result<Self> {
        Self::with_timeout(provider, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    ///
    /// # Errors
    /// Returns [`LagError::InvalidParameter`] if the TLS backend cannot be
    /// initialised.
    pub fn with_timeout(provider: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LagError::InvalidParameter(format!("HTTP client: {e}")))?;

        Ok(Self::with_client(client, provider))
    }

    /// Wrap an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_client(client: reqwest::Client, provider: impl Into<String>) -> Self {
        Self {
            client,
            provider: provider.into(),
        }
    }

    /// The underlying client, for building custom (e.g. signed) requests.
    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// The provider name used in error reports.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn unavailable(&self, reason: impl ToString) -> LagError {
        LagError::upstream(&self.provider, reason)
    }

    /// Send a prepared request and return the raw response on success.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                self.unavailable("request timed out")
            } else {
                self.unavailable(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {status}")));
        }

        Ok(response)
    }

    /// Send a prepared request and return its non-empty body.
    ///
    /// # Errors
    /// Returns [`LagError::UpstreamUnavailable`] on transport failure,
    /// non-success status or an empty body.
    pub async fn send_text(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let text = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| self.unavailable(e))?;

        if text.trim().is_empty() {
            return Err(self.unavailable("empty response body"));
        }

        Ok(text)
    }

    /// GET `url` and return its non-empty body.
    ///
    /// # Errors
    /// See [`HttpClient::send_text`].
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!(provider = %self.provider, "GET {}", redact(url));
        self.send_text(self.client.get(url)).await
    }

    /// GET `url` and deserialize its JSON body.
    ///
    /// # Errors
    /// As [`HttpClient::get_text`], plus [`LagError::Parse`] if the body does
    /// not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get_text(url).await?;
        parse_json(&text)
    }

    /// GET `url` and return its raw body.
    ///
    /// # Errors
    /// See [`HttpClient::send_text`].
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(provider = %self.provider, "GET {}", redact(url));
        let bytes = self
            .send(self.client.get(url))
            .await?
            .bytes()
            .await
            .map_err(|e| self.unavailable(e))?;

        if bytes.is_empty() {
            return Err(self.unavailable("empty response body"));
        }

        Ok(bytes.to_vec())
    }

    /// Download an image and embed it as a [`Picture`].
    ///
    /// # Errors
    /// Any failure is reported as [`LagError::PartialMediaFailure`] so callers
    /// can omit just the picture.
    pub async fn fetch_picture(&self, url: &str) -> Result<Picture> {
        let bytes = self
            .get_bytes(url)
            .await
            .map_err(|e| LagError::PartialMediaFailure(e.to_string()))?;
        picture::embed(&bytes)
    }

    /// Download an image and read its pixel dimensions.
    ///
    /// # Errors
    /// Any failure is reported as [`LagError::PartialMediaFailure`].
    pub async fn fetch_image_size(&self, url: &str) -> Result<(u32, u32)> {
        let bytes = self
            .get_bytes(url)
            .await
            .map_err(|e| LagError::PartialMediaFailure(e.to_string()))?;
        picture::sniff(&bytes)
            .map(|info| (info.width, info.height))
            .ok_or_else(|| LagError::PartialMediaFailure(format!("unrecognised image at {url}")))
    }
}

/// Deserialize a JSON payload, mapping failures to [`LagError::Parse`].
///
/// # Errors
/// Returns [`LagError::Parse`] if `text` does not match `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| LagError::Parse(e.to_string()))
}

/// Strip the query string so tokens never reach the logs.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, png_3x2};

    /// Serve one canned response at `/resource` and return the URL to request.
    async fn serve(status: u16, body: Vec<u8>) -> (MockServer, String) {
        let server = MockServer::start().await;
        server.mock("/resource", status, body);
        let url = format!("{}/resource?access_token=secret", server.url());
        (server, url)
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(
            redact("https://graph.facebook.com/page?access_token=a|b"),
            "https://graph.facebook.com/page"
        );
        assert_eq!(redact("https://example.com/"), "https://example.com/");
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let (_server, url) = serve(200, br#"{"fan_count": 42}"#.to_vec()).await;
        let client = HttpClient::new("Test").unwrap();
        let value: serde_json::Value = client.get_json(&url).await.unwrap();
        assert_eq!(value["fan_count"], 42);
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_unavailable() {
        let (_server, url) = serve(500, b"oops".to_vec()).await;
        let client = HttpClient::new("Test").unwrap();
        let err = client.get_text(&url).await.unwrap_err();
        assert!(matches!(err, LagError::UpstreamUnavailable { ref provider, .. } if provider == "Test"));
    }

    #[tokio::test]
    async fn test_empty_body_is_upstream_unavailable() {
        let (_server, url) = serve(200, Vec::new()).await;
        let client = HttpClient::new("Test").unwrap();
        let err = client.get_text(&url).await.unwrap_err();
        assert!(matches!(err, LagError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_picture_embeds_image() {
        let (_server, url) = serve(200, png_3x2()).await;
        let client = HttpClient::new("Test").unwrap();
        let picture = client.fetch_picture(&url).await.unwrap();
        assert_eq!((picture.width, picture.height), (3, 2));
        assert!(picture.src.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_fetch_picture_failure_is_partial() {
        let (_server, url) = serve(404, b"missing".to_vec()).await;
        let client = HttpClient::new("Test").unwrap();
        let err = client.fetch_picture(&url).await.unwrap_err();
        assert!(matches!(err, LagError::PartialMediaFailure(_)));
    }
}
