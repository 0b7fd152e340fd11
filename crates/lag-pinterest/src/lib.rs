#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Pinterest profile-page and RSS provider.

mod html;

use async_trait::async_trait;
use chrono::DateTime;
use futures::{StreamExt, stream};
use lag_core::{
    CredentialSource, Environment, HttpClient, LagError, Media, Post, Profile, Result,
    SocialProvider, Statistics, credentials,
};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Pinterest site root.
const SITE_URL: &str = "https://www.pinterest.com";

/// Cache key for this provider's record.
pub const CACHE_KEY: &str = "lag--pinterest";

/// Environment variable for the profile's username.
pub const USERNAME_VAR: &str = "PINTEREST_USERNAME";

/// Concurrent thumbnail size lookups.
const DETAIL_CONCURRENCY: usize = 4;

/// Meta tags mapped to statistics names.
const STATISTICS_TAGS: [(&str, &str); 3] = [
    ("followers", "pinterestapp:followers"),
    ("following", "pinterestapp:following"),
    ("pins", "pinterestapp:pins"),
];

/// Explicit Pinterest settings. Unset fields fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct PinterestConfig {
    /// Profile username.
    pub username: Option<String>,
}

impl PinterestConfig {
    /// Set the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Pinterest profile provider.
#[derive(Debug)]
pub struct PinterestProvider {
    http: HttpClient,
    base_url: String,
    username: String,
    meta: OnceCell<HashMap<String, String>>,
}

impl PinterestProvider {
    /// Create a provider, resolving an unset username from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] if no username is available.
    pub fn new(config: PinterestConfig) -> Result<Self> {
        Self::with_source(config, &Environment)
    }

    /// Create a provider entirely from the environment.
    ///
    /// # Errors
    /// See [`PinterestProvider::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(PinterestConfig::default())
    }

    /// Create a provider, resolving an unset username from `source`.
    ///
    /// # Errors
    /// See [`PinterestProvider::new`].
    pub fn with_source(config: PinterestConfig, source: &dyn CredentialSource) -> Result<Self> {
        let username = credentials::require(config.username.as_deref(), USERNAME_VAR, source)?;

        Ok(Self {
            http: HttpClient::new("Pinterest")?,
            base_url: SITE_URL.to_string(),
            username,
            meta: OnceCell::new(),
        })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http = HttpClient::with_client(client, "Pinterest");
        self
    }

    /// Point the provider at a different site root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured username.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn profile_url(&self) -> String {
        format!("{}/{}/", self.base_url, self.username)
    }

    fn feed_url(&self) -> String {
        format!("{}/{}/feed.rss", self.base_url, self.username)
    }

    /// Profile page meta tags, fetched once.
    async fn meta(&self) -> Result<&HashMap<String, String>> {
        self.meta
            .get_or_try_init(|| async {
                let page = self.http.get_text(&self.profile_url()).await?;
                let tags = html::meta_tags(&page);
                debug!(count = tags.len(), "Scraped Pinterest meta tags");
                Ok(tags)
            })
            .await
    }

    /// Fill in thumbnail dimensions. Failures keep the bare thumbnail.
    async fn with_image_size(&self, mut post: Post) -> Post {
        let Some(media) = post.media.as_mut() else {
            return post;
        };
        match self.http.fetch_image_size(&media.thumbnail).await {
            Ok((width, height)) => {
                media.width = Some(width);
                media.height = Some(height);
            }
            Err(e) => warn!(pin = %post.id, error = %e, "Keeping pin thumbnail without size"),
        }
        post
    }
}

#[async_trait]
impl SocialProvider for PinterestProvider {
    fn name(&self) -> &str {
        "Pinterest"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let mut profile = Profile::new(&self.username);

        let url = match self.meta().await {
            Ok(tags) => tags.get("og:image").cloned(),
            Err(e) => {
                warn!(error = %e, "Pinterest profile without picture");
                None
            }
        };
        if let Some(url) = url {
            match self.http.fetch_picture(&url).await {
                Ok(picture) => profile.picture = Some(picture),
                Err(e) => warn!(error = %e, "Omitting Pinterest profile picture"),
            }
        }

        Ok(profile)
    }

    async fn fetch_statistics(&self) -> Result<Statistics> {
        Ok(statistics_from_meta(self.meta().await?))
    }

    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>> {
        let body = self.http.get_text(&self.feed_url()).await?;
        let pins = parse_feed(&body, max_results)?;

        let posts: Vec<Post> = stream::iter(pins)
            .map(|post| self.with_image_size(post))
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;
        debug!(count = posts.len(), "Normalized Pinterest pins");
        Ok(posts)
    }
}

fn statistics_from_meta(tags: &HashMap<String, String>) -> Statistics {
    let mut stats = Statistics::new();
    for (name, tag) in STATISTICS_TAGS {
        let value = tags.get(tag).and_then(|raw| {
            let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        });
        stats.insert_opt(name, value);
    }
    stats
}

/// Parse the pin feed, keeping at most `max_results` pins in feed order.
fn parse_feed(body: &str, max_results: usize) -> Result<Vec<Post>> {
    let channel = rss::Channel::read_from(body.as_bytes())
        .map_err(|e| LagError::Parse(format!("Pinterest feed: {e}")))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(pin_to_post)
        .take(max_results)
        .collect())
}

fn pin_to_post(item: &rss::Item) -> Option<Post> {
    let link = item.link()?;
    let id = item.guid().map_or(link, |guid| guid.value());

    let date = match item.pub_date().map(DateTime::parse_from_rfc2822) {
        Some(Ok(date)) => date.timestamp(),
        _ => {
            warn!(pin = %id, "Skipping pin without a valid pubDate");
            return None;
        }
    };

    let fragment = item.description().unwrap_or_default();
    let text = html::paragraph_text(fragment, 1).unwrap_or_else(|| html::strip_tags(fragment));

    let mut post = Post::new(id, text, date).with_link(link);
    if let Some(title) = item.title() {
        post = post.with_title(title);
    }
    if let Some(src) = html::first_image(fragment) {
        post = post.with_media(Media::new(src));
    }
    Some(post)
}
