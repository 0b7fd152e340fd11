#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Instagram Graph API provider.
//!
//! The account payload backs both the profile and the statistics, so it is
//! fetched at most once per provider instance.

use async_trait::async_trait;
use chrono::DateTime;
use lag_core::{
    CredentialSource, Environment, HttpClient, LagError, Media, Post, Profile, Result,
    SocialProvider, Statistics, credentials,
};
use serde::Deserialize;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

/// Instagram Graph API base URL.
const GRAPH_API_URL: &str = "https://graph.instagram.com";

/// Cache key for this provider's record.
pub const CACHE_KEY: &str = "lag--instagram";

/// Environment variable for the access token.
pub const ACCESS_TOKEN_VAR: &str = "INSTAGRAM_ACCESS_TOKEN";

const ACCOUNT_FIELDS: &str = "username,profile_picture_url,followers_count,follows_count,media_count";
const MEDIA_FIELDS: &str =
    "id,caption,media_type,media_url,thumbnail_url,permalink,timestamp,like_count,comments_count";

/// Explicit Instagram credentials. Unset fields fall back to the environment.
#[derive(Clone, Default)]
pub struct InstagramConfig {
    /// Long-lived user access token.
    pub access_token: Option<String>,
}

impl fmt::Debug for InstagramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl InstagramConfig {
    /// Set the access token.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }
}

/// Instagram account provider.
pub struct InstagramProvider {
    http: HttpClient,
    base_url: String,
    access_token: String,
    account: OnceCell<Account>,
}

impl fmt::Debug for InstagramProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramProvider")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl InstagramProvider {
    /// Create a provider, resolving an unset token from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] if no token is available.
    pub fn new(config: InstagramConfig) -> Result<Self> {
        Self::with_source(config, &Environment)
    }

    /// Create a provider entirely from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] if no token is available.
    pub fn from_env() -> Result<Self> {
        Self::new(InstagramConfig::default())
    }

    /// Create a provider, resolving an unset token from `source`.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] if no token is available.
    pub fn with_source(config: InstagramConfig, source: &dyn CredentialSource) -> Result<Self> {
        let access_token =
            credentials::require(config.access_token.as_deref(), ACCESS_TOKEN_VAR, source)?;

        Ok(Self {
            http: HttpClient::new("Instagram")?,
            base_url: GRAPH_API_URL.to_string(),
            access_token,
            account: OnceCell::new(),
        })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http = HttpClient::with_client(client, "Instagram");
        self
    }

    /// Point the provider at a different Graph API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| LagError::InvalidParameter(format!("Instagram API URL: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("access_token", &self.access_token);
        Ok(url.into())
    }

    /// The authenticated account, fetched once.
    async fn account(&self) -> Result<&Account> {
        self.account
            .get_or_try_init(|| async {
                let url = self.endpoint("me", &[("fields", ACCOUNT_FIELDS)])?;
                self.http.get_json::<Account>(&url).await
            })
            .await
    }
}

#[async_trait]
impl SocialProvider for InstagramProvider {
    fn name(&self) -> &str {
        "Instagram"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let account = self.account().await?;
        let mut profile = Profile::new(&account.username);

        if let Some(url) = &account.profile_picture_url {
            match self.http.fetch_picture(url).await {
                Ok(picture) => profile.picture = Some(picture),
                Err(e) => warn!(error = %e, "Omitting Instagram profile picture"),
            }
        }

        Ok(profile)
    }

    async fn fetch_statistics(&self) -> Result<Statistics> {
        Ok(self.account().await?.statistics())
    }

    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>> {
        let limit = max_results.to_string();
        let url = self.endpoint(
            "me/media",
            &[("fields", MEDIA_FIELDS), ("limit", limit.as_str())],
        )?;
        let page: MediaPage = self.http.get_json(&url).await?;

        let posts: Vec<Post> = page
            .data
            .into_iter()
            .filter_map(normalize_media)
            .take(max_results)
            .collect();
        debug!(count = posts.len(), "Normalized Instagram media");
        Ok(posts)
    }
}

/// Convert one media item. Items without a parseable timestamp are dropped.
fn normalize_media(item: RawMedia) -> Option<Post> {
    let date = DateTime::parse_from_str(&item.timestamp, "%Y-%m-%dT%H:%M:%S%z")
        .ok()?
        .timestamp();

    let mut post = Post::new(item.id, item.caption.unwrap_or_default(), date);
    if let Some(link) = item.permalink {
        post = post.with_link(link);
    }

    let image = match item.media_type.as_deref() {
        Some("VIDEO") => item.thumbnail_url.or(item.media_url),
        _ => item.media_url.or(item.thumbnail_url),
    };
    if let Some(image) = image {
        post = post.with_media(Media::new(image));
    }

    if let Some(likes) = item.like_count {
        post = post.with_counter("likes", likes);
    }
    if let Some(comments) = item.comments_count {
        post = post.with_counter("comments", comments);
    }

    Some(post)
}

// ============================================================================
// Instagram API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Account {
    username: String,
    profile_picture_url: Option<String>,
    followers_count: Option<u64>,
    follows_count: Option<u64>,
    media_count: Option<u64>,
}

impl Account {
    fn statistics(&self) -> Statistics {
        let mut stats = Statistics::new();
        stats.insert_opt("followers", self.followers_count);
        stats.insert_opt("following", self.follows_count);
        stats.insert_opt("posts", self.media_count);
        stats
    }
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    data: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    id: String,
    caption: Option<String>,
    media_type: Option<String>,
    media_url: Option<String>,
    thumbnail_url: Option<String>,
    permalink: Option<String>,
    timestamp: String,
    like_count: Option<u64>,
    comments_count: Option<u64>,
}
