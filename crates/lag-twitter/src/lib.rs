#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Twitter v1.1 provider.

mod oauth;

use async_trait::async_trait;
use chrono::DateTime;
use lag_core::{
    CredentialSource, Environment, HttpClient, Media, Post, Profile, Result, SocialProvider,
    Statistics, credentials, http::parse_json,
};
use oauth::OAuthCredentials;
use serde::Deserialize;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Twitter REST API base URL.
const API_URL: &str = "https://api.twitter.com/1.1";

/// Cache key for this provider's record.
pub const CACHE_KEY: &str = "lag--twitter";

/// Environment variable for the consumer key.
pub const API_KEY_VAR: &str = "TWITTER_API_KEY";
/// Environment variable for the consumer secret.
pub const API_SECRET_VAR: &str = "TWITTER_API_SECRET";
/// Environment variable for the access token.
pub const ACCESS_TOKEN_VAR: &str = "TWITTER_ACCESS_TOKEN";
/// Environment variable for the access token secret.
pub const ACCESS_TOKEN_SECRET_VAR: &str = "TWITTER_ACCESS_TOKEN_SECRET";
/// Environment variable for the account's screen name.
pub const USERNAME_VAR: &str = "TWITTER_USERNAME";

/// Tweets requested per timeline call. Replies and retweets are removed
/// after `count` is applied, so this must exceed the typical `max_results`.
const TIMELINE_FETCH_COUNT: usize = 40;
/// Upper bound the timeline endpoint accepts for `count`.
const TIMELINE_MAX_COUNT: usize = 200;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Explicit Twitter credentials. Unset fields fall back to the environment.
#[derive(Clone, Default)]
pub struct TwitterConfig {
    /// Consumer (API) key.
    pub api_key: Option<String>,
    /// Consumer (API) secret.
    pub api_secret: Option<String>,
    /// User access token.
    pub access_token: Option<String>,
    /// User access token secret.
    pub access_token_secret: Option<String>,
    /// Screen name whose timeline is read.
    pub username: Option<String>,
}

impl fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TwitterConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("access_token", &redact(&self.access_token))
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("username", &self.username)
            .finish()
    }
}

impl TwitterConfig {
    /// Set the consumer key and secret.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self.api_secret = Some(secret.into());
        self
    }

    /// Set the access token and its secret.
    #[must_use]
    pub fn with_access_token(
        mut self,
        token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.access_token = Some(token.into());
        self.access_token_secret = Some(secret.into());
        self
    }

    /// Set the screen name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Twitter account provider.
pub struct TwitterProvider {
    http: HttpClient,
    base_url: String,
    credentials: OAuthCredentials,
    username: String,
    user: OnceCell<User>,
}

impl fmt::Debug for TwitterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterProvider")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl TwitterProvider {
    /// Create a provider, resolving unset fields from the environment.
    ///
    /// # Errors
    /// Returns [`lag_core::LagError::MissingCredential`] naming the first
    /// variable that could not be resolved.
    pub fn new(config: TwitterConfig) -> Result<Self> {
        Self::with_source(config, &Environment)
    }

    /// Create a provider entirely from the environment.
    ///
    /// # Errors
    /// See [`TwitterProvider::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(TwitterConfig::default())
    }

    /// Create a provider, resolving unset fields from `source`.
    ///
    /// # Errors
    /// See [`TwitterProvider::new`].
    pub fn with_source(config: TwitterConfig, source: &dyn CredentialSource) -> Result<Self> {
        let credentials = OAuthCredentials {
            consumer_key: credentials::require(config.api_key.as_deref(), API_KEY_VAR, source)?,
            consumer_secret: credentials::require(
                config.api_secret.as_deref(),
                API_SECRET_VAR,
                source,
            )?,
            token: credentials::require(config.access_token.as_deref(), ACCESS_TOKEN_VAR, source)?,
            token_secret: credentials::require(
                config.access_token_secret.as_deref(),
                ACCESS_TOKEN_SECRET_VAR,
                source,
            )?,
        };
        let username = credentials::require(config.username.as_deref(), USERNAME_VAR, source)?;

        Ok(Self {
            http: HttpClient::new("Twitter")?,
            base_url: API_URL.to_string(),
            credentials,
            username,
            user: OnceCell::new(),
        })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http = HttpClient::with_client(client, "Twitter");
        self
    }

    /// Point the provider at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured screen name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Signed GET against `path` with `params` as the query.
    async fn signed_get(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        let authorization = self.credentials.authorization_header("GET", &url, params)?;

        debug!(provider = "Twitter", "GET {}", url);
        let request = self
            .http
            .inner()
            .get(format!("{url}?{}", oauth::query_string(params)))
            .header(reqwest::header::AUTHORIZATION, authorization);
        self.http.send_text(request).await
    }

    /// The authenticated user, fetched once.
    async fn user(&self) -> Result<&User> {
        self.user
            .get_or_try_init(|| async {
                let body = self
                    .signed_get(
                        "account/verify_credentials.json",
                        &[("include_entities", "false"), ("skip_status", "true")],
                    )
                    .await?;
                parse_json::<User>(&body)
            })
            .await
    }
}

#[async_trait]
impl SocialProvider for TwitterProvider {
    fn name(&self) -> &str {
        "Twitter"
    }

    fn cache_key(&self) -> &str {
        CACHE_KEY
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let mut profile = Profile::new(&self.username);

        let url = match self.user().await {
            Ok(user) => user.profile_image_url_https.clone(),
            Err(e) => {
                warn!(error = %e, "Twitter profile without picture");
                None
            }
        };
        if let Some(url) = url {
            match self.http.fetch_picture(&url).await {
                Ok(picture) => profile.picture = Some(picture),
                Err(e) => warn!(error = %e, "Omitting Twitter profile picture"),
            }
        }

        Ok(profile)
    }

    async fn fetch_statistics(&self) -> Result<Statistics> {
        Ok(self.user().await?.statistics())
    }

    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>> {
        let count = TIMELINE_FETCH_COUNT
            .max(max_results)
            .min(TIMELINE_MAX_COUNT)
            .to_string();
        let body = self
            .signed_get(
                "statuses/user_timeline.json",
                &[
                    ("screen_name", self.username.as_str()),
                    ("count", count.as_str()),
                    ("exclude_replies", "true"),
                    ("include_rts", "false"),
                    ("tweet_mode", "extended"),
                ],
            )
            .await?;
        let tweets: Vec<Tweet> = parse_json(&body)?;

        let fetched = tweets.len();
        let posts: Vec<Post> = tweets
            .into_iter()
            .filter_map(Tweet::into_post)
            .take(max_results)
            .collect();
        debug!(fetched, kept = posts.len(), "Normalized Twitter timeline");
        Ok(posts)
    }
}

// ============================================================================
// Twitter API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct User {
    profile_image_url_https: Option<String>,
    followers_count: Option<u64>,
    friends_count: Option<u64>,
    favourites_count: Option<u64>,
}

impl User {
    fn statistics(&self) -> Statistics {
        let mut stats = Statistics::new();
        stats.insert_opt("followers", self.followers_count);
        stats.insert_opt("friends", self.friends_count);
        stats.insert_opt("favourites", self.favourites_count);
        stats
    }
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id_str: String,
    created_at: String,
    #[serde(alias = "text")]
    full_text: String,
    favorite_count: Option<u64>,
    retweet_count: Option<u64>,
    extended_entities: Option<ExtendedEntities>,
}

impl Tweet {
    fn into_post(self) -> Option<Post> {
        let date = match DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT) {
            Ok(date) => date.timestamp(),
            Err(e) => {
                warn!(id = %self.id_str, error = %e, "Skipping tweet with unparseable date");
                return None;
            }
        };

        let link = format!("https://twitter.com/statuses/{}", self.id_str);
        let mut post = Post::new(self.id_str, self.full_text, date).with_link(link);

        let media = self
            .extended_entities
            .and_then(|entities| entities.media.into_iter().next());
        if let Some(media) = media {
            post = post.with_media(media.into_media());
        }

        if let Some(favourites) = self.favorite_count {
            post = post.with_counter("favourites", favourites);
        }
        if let Some(retweets) = self.retweet_count {
            post = post.with_counter("retweets", retweets);
        }

        Some(post)
    }
}

#[derive(Debug, Deserialize)]
struct ExtendedEntities {
    #[serde(default)]
    media: Vec<TweetMedia>,
}

#[derive(Debug, Deserialize)]
struct TweetMedia {
    media_url_https: String,
    sizes: Option<MediaSizes>,
}

impl TweetMedia {
    fn into_media(self) -> Media {
        let media = Media::new(format!("{}:large", self.media_url_https));
        match self.sizes.and_then(|sizes| sizes.large) {
            Some(large) => media.with_size(large.w, large.h),
            None => media,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaSizes {
    large: Option<MediaSize>,
}

#[derive(Debug, Deserialize)]
struct MediaSize {
    w: u32,
    h: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lag_core::LagError;
    use lag_core::testing::MockServer;
    use std::collections::HashMap;

    fn full_env() -> HashMap<String, String> {
        [
            (API_KEY_VAR, "key"),
            (API_SECRET_VAR, "secret"),
            (ACCESS_TOKEN_VAR, "token"),
            (ACCESS_TOKEN_SECRET_VAR, "token-secret"),
            (USERNAME_VAR, "rustlang"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_resolves_credentials_from_source() {
        let provider = TwitterProvider::with_source(TwitterConfig::default(), &full_env()).unwrap();
        assert_eq!(provider.username(), "rustlang");
        assert_eq!(provider.cache_key(), "lag--twitter");
        assert!(!format!("{provider:?}").contains("token-secret"));
    }

    #[test]
    fn test_explicit_username_overrides_environment() {
        let provider = TwitterProvider::with_source(
            TwitterConfig::default().with_username("ferris"),
            &full_env(),
        )
        .unwrap();
        assert_eq!(provider.username(), "ferris");
    }

    #[test]
    fn test_missing_secret_is_named() {
        let mut env = full_env();
        env.remove(ACCESS_TOKEN_SECRET_VAR);
        let err = TwitterProvider::with_source(TwitterConfig::default(), &env).unwrap_err();
        assert!(
            matches!(err, LagError::MissingCredential { ref variable } if variable == ACCESS_TOKEN_SECRET_VAR)
        );
    }

    #[test]
    fn test_user_statistics() {
        let user: User = serde_json::from_str(
            r#"{"screen_name": "rustlang", "followers_count": 150000, "friends_count": 120,
                "favourites_count": 3400, "profile_image_url_https": "https://pbs/rust.png"}"#,
        )
        .unwrap();
        let stats = user.statistics();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.get("followers"), Some(150_000));
        assert_eq!(stats.get("friends"), Some(120));
        assert_eq!(stats.get("favourites"), Some(3400));
    }

    #[test]
    fn test_timeline_normalization() {
        let tweets: Vec<Tweet> = serde_json::from_str(
            r#"[
                {"id_str": "1785", "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                 "full_text": "Rust 1.30 is out", "favorite_count": 10, "retweet_count": 3,
                 "extended_entities": {"media": [{"media_url_https": "https://pbs/a.jpg",
                    "sizes": {"large": {"w": 1024, "h": 512, "resize": "fit"}}}]}},
                {"id_str": "1784", "created_at": "not a date", "full_text": "broken"},
                {"id_str": "1783", "created_at": "Tue Oct 09 20:19:24 +0000 2018",
                 "full_text": "no media", "favorite_count": 1, "retweet_count": 0}
            ]"#,
        )
        .unwrap();

        let posts: Vec<Post> = tweets.into_iter().filter_map(Tweet::into_post).collect();
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.id, "1785");
        assert_eq!(first.date, 1_539_202_764);
        assert_eq!(first.link.as_deref(), Some("https://twitter.com/statuses/1785"));
        assert_eq!(first.counter("favourites"), Some(10));
        assert_eq!(first.counter("retweets"), Some(3));
        let media = first.media.as_ref().unwrap();
        assert_eq!(media.thumbnail, "https://pbs/a.jpg:large");
        assert_eq!((media.width, media.height), (Some(1024), Some(512)));

        assert!(posts[1].media.is_none());
        assert_eq!(posts[1].counter("retweets"), Some(0));
    }

    fn local_provider(server: &MockServer) -> TwitterProvider {
        TwitterProvider::with_source(TwitterConfig::default(), &full_env())
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_timeline_overfetches_then_truncates() {
        let server = MockServer::start().await;
        let tweets: Vec<String> = (0..45)
            .map(|i| {
                format!(
                    r#"{{"id_str": "{}", "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                        "full_text": "tweet {i}"}}"#,
                    1000 - i
                )
            })
            .collect();
        server.mock("/statuses/user_timeline.json", 200, format!("[{}]", tweets.join(",")));

        let posts = local_provider(&server).fetch_posts(3).await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1000", "999", "998"]);

        let requests = server.requests_to("/statuses/user_timeline.json");
        assert_eq!(requests.len(), 1);
        let target = &requests[0].target;
        assert!(target.contains("count=40"));
        assert!(target.contains("screen_name=rustlang"));
        assert!(target.contains("exclude_replies=true"));
        assert!(target.contains("include_rts=false"));
        assert!(requests[0].head.to_ascii_lowercase().contains("authorization: oauth "));
    }

    #[tokio::test]
    async fn test_timeline_count_is_capped() {
        let server = MockServer::start().await;
        server.mock("/statuses/user_timeline.json", 200, "[]");

        let posts = local_provider(&server).fetch_posts(500).await.unwrap();
        assert!(posts.is_empty());
        let requests = server.requests_to("/statuses/user_timeline.json");
        assert!(requests[0].target.contains("count=200"));
    }

    #[tokio::test]
    async fn test_profile_without_reachable_picture() {
        let server = MockServer::start().await;
        let user = format!(
            r#"{{"profile_image_url_https": "{}/avatar_normal.jpg", "followers_count": 12}}"#,
            server.url()
        );
        server.mock("/account/verify_credentials.json", 200, user);
        server.mock("/avatar_normal.jpg", 404, "gone");

        let provider = local_provider(&server);
        let profile = provider.fetch_profile().await.unwrap();
        assert_eq!(profile.username, "rustlang");
        assert!(profile.picture.is_none());

        let stats = provider.fetch_statistics().await.unwrap();
        assert_eq!(stats.get("followers"), Some(12));
        assert_eq!(server.requests_to("/account/verify_credentials.json").len(), 1);
    }
}
