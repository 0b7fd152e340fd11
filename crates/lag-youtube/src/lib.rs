#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! YouTube Data API v3 provider.

use async_trait::async_trait;
use chrono::DateTime;
use futures::{StreamExt, stream};
use lag_core::{
    CredentialSource, Environment, HttpClient, LagError, Media, Post, Profile, Result,
    SocialProvider, Statistics, credentials,
};
use serde::Deserialize;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

/// YouTube Data API base URL.
const DATA_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Cache key for this provider's record.
pub const CACHE_KEY: &str = "lag--youtube";

/// Environment variable for the Google API key.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
/// Environment variable for the channel id.
pub const CHANNEL_ID_VAR: &str = "YOUTUBE_CHANNELID";
/// Environment variable for the display username.
pub const USERNAME_VAR: &str = "YOUTUBE_USERNAME";

/// Concurrent per-video detail lookups.
const DETAIL_CONCURRENCY: usize = 4;

/// Largest `maxResults` the search endpoint accepts.
const SEARCH_MAX_RESULTS: usize = 50;

/// Explicit YouTube settings. Unset fields fall back to the environment.
#[derive(Clone, Default)]
pub struct YouTubeConfig {
    /// Google API key with the Data API enabled.
    pub api_key: Option<String>,
    /// Channel id (`UC...`).
    pub channel_id: Option<String>,
    /// Display name reported as the profile username.
    pub username: Option<String>,
}

impl fmt::Debug for YouTubeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("channel_id", &self.channel_id)
            .field("username", &self.username)
            .finish()
    }
}

impl YouTubeConfig {
    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the channel id.
    #[must_use]
    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Set the display username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// YouTube channel provider.
pub struct YouTubeProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    channel_id: String,
    username: String,
    channel: OnceCell<Channel>,
}

impl fmt::Debug for YouTubeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeProvider")
            .field("base_url", &self.base_url)
            .field("channel_id", &self.channel_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl YouTubeProvider {
    /// Create a provider, resolving unset fields from the environment.
    ///
    /// # Errors
    /// Returns [`LagError::MissingCredential`] naming the first variable that
    /// could not be resolved.
    pub fn new(config: YouTubeConfig) -> Result<Self> {
        Self::with_source(config, &Environment)
    }

    /// Create a provider entirely from the environment.
    ///
    /// # Errors
    /// See [`YouTubeProvider::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(YouTubeConfig::default())
    }

    /// Create a provider, resolving unset fields from `source`.
    ///
    /// # Errors
    /// See [`YouTubeProvider::new`].
    pub fn with_source(config: YouTubeConfig, source: &dyn CredentialSource) -> Result<Self> {
        let api_key = credentials::require(config.api_key.as_deref(), API_KEY_VAR, source)?;
        let channel_id =
            credentials::require(config.channel_id.as_deref(), CHANNEL_ID_VAR, source)?;
        let username = credentials::require(config.username.as_deref(), USERNAME_VAR, source)?;

        Ok(Self {
            http: HttpClient::new("YouTube")?,
            base_url: DATA_API_URL.to_string(),
            api_key,
            channel_id,
            username,
            channel: OnceCell::new(),
        })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http = HttpClient::with_client(client, "YouTube");
        self
    }

    /// Point the provider at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured channel id.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, resource))
            .map_err(|e| LagError::InvalidParameter(format!("YouTube API URL: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        Ok(url.into())
    }

    /// Channel snippet and statistics, fetched once.
    async fn channel(&self) -> Result<&Channel> {
        self.channel
            .get_or_try_init(|| async {
                let url = self.endpoint(
                    "channels",
                    &[("part", "snippet,statistics"), ("id", self.channel_id.as_str())],
                )?;
                let list: ItemList<Channel> = self.http.get_json(&url).await?;
                list.items.into_iter().next().ok_or_else(|| {
                    LagError::upstream("YouTube", format!("channel {} not found", self.channel_id))
                })
            })
            .await
    }

    /// Add counters and embed markup. Failures leave `post` unchanged.
    async fn with_details(&self, mut post: Post) -> Post {
        let details = async {
            let url = self.endpoint(
                "videos",
                &[("part", "statistics,player"), ("id", post.id.as_str())],
            )?;
            let list: ItemList<VideoDetails> = self.http.get_json(&url).await?;
            list.items
                .into_iter()
                .next()
                .ok_or_else(|| LagError::upstream("YouTube", format!("video {} not found", post.id)))
        };
        let details = details.await;

        match details {
            Ok(details) => details.apply(&mut post),
            Err(e) => warn!(video = %post.id, error = %e, "Keeping video without details"),
        }
        post
    }
}

#[async_trait]
impl SocialProvider for YouTubeProvider {
    fn name(&self) -> &str {
        "YouTube"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let mut profile = Profile::new(&self.username);

        let url = match self.channel().await {
            Ok(channel) => channel.picture_url().map(str::to_string),
            Err(e) => {
                warn!(error = %e, "YouTube profile without picture");
                None
            }
        };
        if let Some(url) = url {
            match self.http.fetch_picture(&url).await {
                Ok(picture) => profile.picture = Some(picture),
                Err(e) => warn!(error = %e, "Omitting YouTube profile picture"),
            }
        }

        Ok(profile)
    }

    async fn fetch_statistics(&self) -> Result<Statistics> {
        let channel = self.channel().await?;
        Ok(channel
            .statistics
            .as_ref()
            .map(ChannelStatistics::normalize)
            .unwrap_or_default())
    }

    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>> {
        let limit = max_results.min(SEARCH_MAX_RESULTS).to_string();
        let url = self.endpoint(
            "search",
            &[
                ("part", "snippet"),
                ("channelId", self.channel_id.as_str()),
                ("maxResults", limit.as_str()),
                ("order", "date"),
                ("type", "video"),
            ],
        )?;
        let list: ItemList<SearchResult> = self.http.get_json(&url).await?;

        let base: Vec<Post> = list
            .items
            .into_iter()
            .filter_map(SearchResult::into_post)
            .take(max_results)
            .collect();

        let posts: Vec<Post> = stream::iter(base)
            .map(|post| self.with_details(post))
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;
        debug!(count = posts.len(), "Normalized YouTube videos");
        Ok(posts)
    }
}

/// Parse one of the API's stringly-typed counters.
fn count(value: Option<&String>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

// ============================================================================
// YouTube API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    snippet: Option<ChannelSnippet>,
    statistics: Option<ChannelStatistics>,
}

impl Channel {
    fn picture_url(&self) -> Option<&str> {
        let thumbnails = &self.snippet.as_ref()?.thumbnails;
        thumbnails
            .high
            .as_ref()
            .or(thumbnails.medium.as_ref())
            .or(thumbnails.default.as_ref())
            .map(|t| t.url.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    video_count: Option<String>,
    view_count: Option<String>,
    subscriber_count: Option<String>,
}

impl ChannelStatistics {
    fn normalize(&self) -> Statistics {
        let mut stats = Statistics::new();
        stats.insert_opt("videos", count(self.video_count.as_ref()));
        stats.insert_opt("views", count(self.view_count.as_ref()));
        stats.insert_opt("subscribers", count(self.subscriber_count.as_ref()));
        stats
    }
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchId,
    snippet: VideoSnippet,
}

impl SearchResult {
    fn into_post(self) -> Option<Post> {
        let video_id = self.id.video_id?;
        let date = match DateTime::parse_from_rfc3339(&self.snippet.published_at) {
            Ok(date) => date.timestamp(),
            Err(e) => {
                warn!(video = %video_id, error = %e, "Skipping video with unparseable date");
                return None;
            }
        };

        let link = format!("https://www.youtube.com/watch?v={video_id}");
        let mut post = Post::new(video_id, self.snippet.description, date)
            .with_title(self.snippet.title)
            .with_link(link);

        let thumbnails = self.snippet.thumbnails;
        if let Some(thumb) = thumbnails.high.or(thumbnails.medium).or(thumbnails.default) {
            let media = Media::new(thumb.url);
            post = post.with_media(match (thumb.width, thumb.height) {
                (Some(w), Some(h)) => media.with_size(w, h),
                _ => media,
            });
        }

        Some(post)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    published_at: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    statistics: Option<VideoStatistics>,
    player: Option<Player>,
}

impl VideoDetails {
    fn apply(self, post: &mut Post) {
        if let Some(stats) = self.statistics {
            let counters = [
                ("views", stats.view_count),
                ("likes", stats.like_count),
                ("dislikes", stats.dislike_count),
                ("favourites", stats.favorite_count),
                ("comments", stats.comment_count),
            ];
            for (name, value) in counters {
                if let Some(value) = count(value.as_ref()) {
                    post.counters.insert(name.to_string(), value);
                }
            }
        }
        if let Some(html) = self.player.and_then(|p| p.embed_html) {
            post.embed = Some(html);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    dislike_count: Option<String>,
    favorite_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Player {
    embed_html: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lag_core::testing::{MockServer, png_3x2};
    use std::collections::HashMap;

    fn env() -> HashMap<String, String> {
        HashMap::from([
            (API_KEY_VAR.to_string(), "AIza-secret".to_string()),
            (CHANNEL_ID_VAR.to_string(), "UC123".to_string()),
            (USERNAME_VAR.to_string(), "rustvideos".to_string()),
        ])
    }

    #[test]
    fn test_username_is_required() {
        let mut env = env();
        env.remove(USERNAME_VAR);
        let err = YouTubeProvider::with_source(YouTubeConfig::default(), &env).unwrap_err();
        assert!(
            matches!(err, LagError::MissingCredential { ref variable } if variable == USERNAME_VAR)
        );
    }

    #[test]
    fn test_endpoint_appends_key() {
        let provider = YouTubeProvider::with_source(YouTubeConfig::default(), &env()).unwrap();
        let url = provider
            .endpoint("channels", &[("part", "snippet"), ("id", "UC123")])
            .unwrap();
        assert_eq!(
            url,
            "https://www.googleapis.com/youtube/v3/channels?part=snippet&id=UC123&key=AIza-secret"
        );
        assert!(!format!("{provider:?}").contains("AIza-secret"));
    }

    #[test]
    fn test_channel_normalization() {
        let list: ItemList<Channel> = serde_json::from_str(
            r#"{"items": [{"id": "UC123",
                "snippet": {"title": "Rust", "thumbnails": {
                    "default": {"url": "https://yt/d.jpg"},
                    "high": {"url": "https://yt/h.jpg", "width": 800, "height": 800}}},
                "statistics": {"viewCount": "123456", "subscriberCount": "7890",
                    "hiddenSubscriberCount": false, "videoCount": "42"}}]}"#,
        )
        .unwrap();
        let channel = &list.items[0];

        assert_eq!(channel.picture_url(), Some("https://yt/h.jpg"));
        let stats = channel.statistics.as_ref().unwrap().normalize();
        assert_eq!(stats.get("videos"), Some(42));
        assert_eq!(stats.get("views"), Some(123_456));
        assert_eq!(stats.get("subscribers"), Some(7890));
    }

    #[test]
    fn test_hidden_subscribers_are_omitted() {
        let stats: ChannelStatistics =
            serde_json::from_str(r#"{"viewCount": "10", "videoCount": "1"}"#).unwrap();
        let stats = stats.normalize();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("subscribers"), None);
    }

    #[test]
    fn test_search_result_and_details() {
        let list: ItemList<SearchResult> = serde_json::from_str(
            r#"{"items": [
                {"id": {"kind": "youtube#video", "videoId": "abc"},
                 "snippet": {"publishedAt": "2024-03-02T12:00:00Z", "title": "Async Rust",
                    "description": "A talk", "thumbnails": {
                    "high": {"url": "https://i.ytimg/abc.jpg", "width": 480, "height": 360}}}},
                {"id": {"kind": "youtube#playlist", "playlistId": "PL1"},
                 "snippet": {"publishedAt": "2024-03-01T12:00:00Z"}}
            ]}"#,
        )
        .unwrap();
        let mut posts: Vec<Post> = list.items.into_iter().filter_map(SearchResult::into_post).collect();
        assert_eq!(posts.len(), 1);

        let details: VideoDetails = serde_json::from_str(
            r#"{"statistics": {"viewCount": "1000", "likeCount": "50", "dislikeCount": "2",
                "favoriteCount": "0", "commentCount": "7"},
                "player": {"embedHtml": "<iframe src=\"//www.youtube.com/embed/abc\"></iframe>"}}"#,
        )
        .unwrap();
        details.apply(&mut posts[0]);

        let post = &posts[0];
        assert_eq!(post.id, "abc");
        assert_eq!(post.title.as_deref(), Some("Async Rust"));
        assert_eq!(post.text, "A talk");
        assert_eq!(post.date, 1_709_380_800);
        assert_eq!(post.link.as_deref(), Some("https://www.youtube.com/watch?v=abc"));
        assert_eq!(post.counter("views"), Some(1000));
        assert_eq!(post.counter("dislikes"), Some(2));
        assert_eq!(post.counter("favourites"), Some(0));
        assert!(post.embed.as_deref().unwrap().starts_with("<iframe"));
        let media = post.media.as_ref().unwrap();
        assert_eq!((media.width, media.height), (Some(480), Some(360)));
    }

    fn local_provider(server: &MockServer) -> YouTubeProvider {
        YouTubeProvider::with_source(YouTubeConfig::default(), &env())
            .unwrap()
            .with_base_url(server.url())
    }

    fn search_body(ids: &[&str]) -> String {
        let items: Vec<String> = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"id": {{"videoId": "{id}"}},
                        "snippet": {{"publishedAt": "2024-03-02T12:00:00Z", "title": "Video {id}"}}}}"#
                )
            })
            .collect();
        format!(r#"{{"items": [{}]}}"#, items.join(","))
    }

    #[tokio::test]
    async fn test_failed_details_keep_base_post() {
        let server = MockServer::start().await;
        server.mock("/search", 200, search_body(&["a", "b"]));
        server.mock_query("/videos", "id=a&", 500, "backend error");
        server.mock_query(
            "/videos",
            "id=b&",
            200,
            r#"{"items": [{"statistics": {"viewCount": "9"},
                "player": {"embedHtml": "<iframe></iframe>"}}]}"#,
        );

        let posts = local_provider(&server).fetch_posts(2).await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        assert_eq!(posts[0].title.as_deref(), Some("Video a"));
        assert_eq!(posts[0].link.as_deref(), Some("https://www.youtube.com/watch?v=a"));
        assert_eq!(posts[0].counter("views"), None);
        assert!(posts[0].embed.is_none());

        assert_eq!(posts[1].counter("views"), Some(9));
        assert_eq!(posts[1].embed.as_deref(), Some("<iframe></iframe>"));
    }

    #[tokio::test]
    async fn test_search_max_results_is_capped() {
        let server = MockServer::start().await;
        server.mock("/search", 200, search_body(&["a"]));
        server.mock("/videos", 200, r#"{"items": []}"#);

        let posts = local_provider(&server).fetch_posts(60).await.unwrap();
        assert_eq!(posts.len(), 1);

        let search = server.requests_to("/search");
        assert_eq!(search.len(), 1);
        assert!(search[0].target.contains("maxResults=50&"));
        assert!(search[0].target.contains("channelId=UC123"));
    }

    #[tokio::test]
    async fn test_profile_without_reachable_picture() {
        let server = MockServer::start().await;
        let channels = format!(
            r#"{{"items": [{{"snippet": {{"thumbnails": {{"high": {{"url": "{}/avatar.jpg"}}}}}},
                "statistics": {{"videoCount": "3", "viewCount": "30"}}}}]}}"#,
            server.url()
        );
        server.mock("/channels", 200, channels);
        server.mock("/avatar.jpg", 404, "gone");

        let provider = local_provider(&server);
        let profile = provider.fetch_profile().await.unwrap();
        assert_eq!(profile, Profile::new("rustvideos"));

        let stats = provider.fetch_statistics().await.unwrap();
        assert_eq!(stats.get("videos"), Some(3));
        assert_eq!(server.requests_to("/channels").len(), 1);
        assert_eq!(server.requests_to("/avatar.jpg").len(), 1);
    }

    #[tokio::test]
    async fn test_profile_embeds_picture() {
        let server = MockServer::start().await;
        let channels = format!(
            r#"{{"items": [{{"snippet": {{"thumbnails": {{"default": {{"url": "{}/avatar.png"}}}}}}}}]}}"#,
            server.url()
        );
        server.mock("/channels", 200, channels);
        server.mock("/avatar.png", 200, png_3x2());

        let profile = local_provider(&server).fetch_profile().await.unwrap();
        let picture = profile.picture.unwrap();
        assert_eq!((picture.width, picture.height), (3, 2));
        assert!(picture.src.starts_with("data:image/png;base64,"));
    }
}
