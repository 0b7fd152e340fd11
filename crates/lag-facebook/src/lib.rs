#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Facebook Graph API provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use lag_facebook::{FacebookConfig, FacebookProvider};
//! use lag_core::SocialProvider;
//!
//! # async fn example() -> lag_core::Result<()> {
//! let provider = FacebookProvider::new(FacebookConfig::default().with_page_name("rustlang"))?;
//! let stats = provider.fetch_statistics().await?;
//! println!("{:?}", stats.get("likes"));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::DateTime;
use futures::{StreamExt, stream};
use lag_core::{
    CredentialSource, Environment, HttpClient, LagError, Media, Post, Profile, Result,
    SocialProvider, Statistics, credentials,
};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

/// Graph API base URL.
const GRAPH_API_URL: &str = "https://graph.facebook.com/v19.0";

/// Cache key for this provider's record.
pub const CACHE_KEY: &str = "lag--facebook";

/// How many posts to request before filtering down to message posts.
const POSTS_PAGE_SIZE: usize = 25;

/// Largest page the Graph API returns for a feed edge.
const GRAPH_MAX_LIMIT: usize = 100;

/// Concurrent per-post detail requests.
const DETAIL_CONCURRENCY: usize = 4;

/// Environment variable for the app id.
pub const APP_ID_VAR: &str = "FACEBOOK_APP_ID";
/// Environment variable for the app secret.
pub const APP_SECRET_VAR: &str = "FACEBOOK_APP_SECRET";
/// Environment variable for the page name.
pub const PAGE_NAME_VAR: &str = "FACEBOOK_PAGE_NAME";

/// Explicit Facebook credentials. Unset fields fall back to the environment.
#[derive(Clone, Default)]
pub struct FacebookConfig {
    /// App id.
    pub app_id: Option<String>,
    /// App secret.
    pub app_secret: Option<String>,
    /// Page name or id.
    pub page_name: Option<String>,
}

impl fmt::Debug for FacebookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("page_name", &self.page_name)
            .finish()
    }
}

impl FacebookConfig {
    /// Set the app id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the app secret.
    #[must_use]
    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    /// Set the page name.
    #[must_use]
    pub fn with_page_name(mut self, page_name: impl Into<String>) -> Self {
        self.page_name = Some(page_name.into());
        self
    }
}

/// Facebook page provider.
#[derive(Clone)]
pub struct FacebookProvider {
    http: HttpClient,
    base_url: String,
    app_id: String,
    app_secret: String,
    page_name: String,
}

impl fmt::Debug for FacebookProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookProvider")
            .field("page_name", &self.page_name)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

impl FacebookProvider {
    /// Create a provider, resolving unset credentials from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] naming the first missing variable.
    pub fn new(config: FacebookConfig) -> Result<Self> {
        Self::with_source(config, &Environment)
    }

    /// Create a provider entirely from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Self::new(FacebookConfig::default())
    }

    /// Create a provider, resolving unset credentials from `source`.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] naming the first missing variable.
    pub fn with_source(config: FacebookConfig, source: &dyn CredentialSource) -> Result<Self> {
        let app_id = credentials::require(config.app_id.as_deref(), APP_ID_VAR, source)?;
        let app_secret = credentials::require(config.app_secret.as_deref(), APP_SECRET_VAR, source)?;
        let page_name = credentials::require(config.page_name.as_deref(), PAGE_NAME_VAR, source)?;

        Ok(Self {
            http: HttpClient::new("Facebook")?,
            base_url: GRAPH_API_URL.to_string(),
            app_id,
            app_secret,
            page_name,
        })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http = HttpClient::with_client(client, "Facebook");
        self
    }

    /// Point the provider at a different Graph API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured page name.
    #[must_use]
    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    /// Build a Graph API URL carrying the app access token.
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let token = format!("{}|{}", self.app_id, self.app_secret);
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| LagError::InvalidParameter(format!("Graph API URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("access_token", &token)
            .extend_pairs(params);
        Ok(url.into())
    }

    /// Enrich a post with attachment media and engagement totals.
    ///
    /// Each sub-fetch is independent; a failure omits only its field.
    async fn with_details(&self, graph_id: String, mut post: Post) -> Post {
        let attachments = async {
            let url = self.endpoint(&format!("{graph_id}/attachments"), &[])?;
            self.http.get_json::<Attachments>(&url).await
        };
        let likes = async {
            let url = self.endpoint(&format!("{graph_id}/likes"), &[("summary", "true")])?;
            self.http.get_json::<SummaryResponse>(&url).await
        };
        let comments = async {
            let url = self.endpoint(&format!("{graph_id}/comments"), &[("summary", "true")])?;
            self.http.get_json::<SummaryResponse>(&url).await
        };

        let (attachments, likes, comments) = tokio::join!(attachments, likes, comments);

        match attachments {
            Ok(attachments) => post.media = attachments.into_media(),
            Err(e) => warn!(post = %post.id, error = %e, "Failed to fetch post attachments"),
        }
        for (name, result) in [("likes", likes), ("comments", comments)] {
            match result {
                Ok(summary) => {
                    if let Some(total) = summary.total() {
                        post.counters.insert(name.to_string(), total);
                    }
                }
                Err(e) => warn!(post = %post.id, error = %e, "Failed to fetch post {}", name),
            }
        }

        post
    }
}

#[async_trait]
impl SocialProvider for FacebookProvider {
    fn name(&self) -> &str {
        "Facebook"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let mut profile = Profile::new(&self.page_name);

        let url = self.endpoint(&format!("{}/picture", self.page_name), &[("type", "large")])?;
        match self.http.fetch_picture(&url).await {
            Ok(picture) => profile.picture = Some(picture),
            Err(e) => warn!(error = %e, "Omitting Facebook profile picture"),
        }

        Ok(profile)
    }

    async fn fetch_statistics(&self) -> Result<Statistics> {
        let url = self.endpoint(&self.page_name, &[("fields", "fan_count,followers_count")])?;
        let page: PageStats = self.http.get_json(&url).await?;
        Ok(page.into_statistics())
    }

    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>> {
        let limit = POSTS_PAGE_SIZE.max(max_results).min(GRAPH_MAX_LIMIT).to_string();
        let url = self.endpoint(
            &format!("{}/posts", self.page_name),
            &[("fields", "id,message,created_time"), ("limit", limit.as_str())],
        )?;
        let page: PostsPage = self.http.get_json(&url).await?;

        let selected = select_posts(page.data, max_results);
        debug!(count = selected.len(), "Selected Facebook message posts");

        let posts = stream::iter(selected)
            .map(|(graph_id, post)| self.with_details(graph_id, post))
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        Ok(posts)
    }
}

/// Keep message posts with a parseable time, newest first, up to `max_results`.
///
/// Returns each post paired with its full Graph id (`pageId_postId`); the
/// normalized post keeps only the trailing segment.
fn select_posts(raw: Vec<RawPost>, max_results: usize) -> Vec<(String, Post)> {
    raw.into_iter()
        .filter_map(|raw| {
            let message = raw.message?;
            let date = parse_graph_time(&raw.created_time)?;
            let short_id = raw.id.rsplit('_').next().unwrap_or(&raw.id).to_string();
            Some((raw.id, Post::new(short_id, message, date)))
        })
        .take(max_results)
        .collect()
}

/// Parse Graph API timestamps such as `2024-01-02T10:00:00+0000`.
fn parse_graph_time(value: &str) -> Option<i64> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z")
        .ok()
        .map(|dt| dt.timestamp())
}

// ============================================================================
// Graph API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageStats {
    fan_count: Option<u64>,
    followers_count: Option<u64>,
}

impl PageStats {
    fn into_statistics(self) -> Statistics {
        let mut stats = Statistics::new();
        stats.insert_opt("likes", self.fan_count);
        stats.insert_opt("followers", self.followers_count);
        stats
    }
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    #[serde(default)]
    data: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    message: Option<String>,
    created_time: String,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    #[serde(default)]
    data: Vec<Attachment>,
}

impl Attachments {
    fn into_media(self) -> Option<Media> {
        let image = self.data.into_iter().next()?.media?.image?;
        let media = Media::new(image.src);
        Some(match (image.width, image.height) {
            (Some(w), Some(h)) => media.with_size(w, h),
            _ => media,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Attachment {
    media: Option<AttachmentMedia>,
}

#[derive(Debug, Deserialize)]
struct AttachmentMedia {
    image: Option<AttachmentImage>,
}

#[derive(Debug, Deserialize)]
struct AttachmentImage {
    src: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: Option<Summary>,
}

impl SummaryResponse {
    fn total(self) -> Option<u64> {
        self.summary.map(|s| s.total_count)
    }
}

#[derive(Debug, Deserialize)]
struct Summary {
    total_count: u64,
}
