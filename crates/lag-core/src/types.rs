//! Normalized schema shared by every provider.
//!
//! This module defines the common record shape:
//!
//! - [`ResultRecord`] - The unit of cache storage and the unit exposed to callers
//! - [`Profile`] - Display identifier and optional embedded picture
//! - [`Picture`] - A profile image embedded as a data URI
//! - [`Statistics`] - Provider-specific non-negative counters
//! - [`Post`] - A single normalized post
//! - [`Media`] - Image or thumbnail attached to a post

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `{profile, statistics, latest}` record produced by one refresh cycle.
///
/// Records are immutable once built; a refresh produces a new record that
/// replaces the cached one wholesale. Every field defaults to empty, so a
/// record missing any top-level key still deserializes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Profile information.
    #[serde(default)]
    pub profile: Profile,
    /// Aggregate counters.
    #[serde(default)]
    pub statistics: Statistics,
    /// Latest posts, newest first.
    #[serde(default, rename = "latest")]
    pub posts: Vec<Post>,
}

impl ResultRecord {
    /// Creates a record from its three parts.
    #[must_use]
    pub const fn new(profile: Profile, statistics: Statistics, posts: Vec<Post>) -> Self {
        Self {
            profile,
            statistics,
            posts,
        }
    }

    /// Returns `true` if no field carries any data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profile.is_empty() && self.statistics.is_empty() && self.posts.is_empty()
    }
}

/// Profile information for one account, page or channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display identifier (page name, handle or channel name).
    #[serde(default)]
    pub username: String,
    /// Embedded profile image. Present only if the image fetch succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<Picture>,
}

impl Profile {
    /// Creates a profile without a picture.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            picture: None,
        }
    }

    /// Attaches an embedded picture.
    #[must_use]
    pub fn with_picture(mut self, picture: Picture) -> Self {
        self.picture = Some(picture);
        self
    }

    /// Returns `true` for the default, never-populated profile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.picture.is_none()
    }
}

/// A profile image embedded as a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// `data:<mime>;base64,<payload>`
    pub src: String,
}

/// Provider-specific counters such as `followers`, `likes` or `subscribers`.
///
/// Keys vary per provider. Values are always non-negative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics(BTreeMap<String, u64>);

impl Statistics {
    /// Creates an empty set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a counter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: u64) {
        self.0.insert(name.into(), value);
    }

    /// Sets a counter if `value` is present.
    pub fn insert_opt(&mut self, name: impl Into<String>, value: Option<u64>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }

    /// Builder form of [`Statistics::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: u64) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns a counter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    /// Number of counters present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no counters are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates counters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for Statistics {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single normalized post.
///
/// Engagement counters (`likes`, `comments`, `views`, ...) are flattened into
/// the serialized object; their vocabulary varies per provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Upstream identifier.
    pub id: String,
    /// Title, for providers that distinguish title from body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text or description. Empty when upstream has none.
    #[serde(default)]
    pub text: String,
    /// Publication time as unix epoch seconds.
    pub date: i64,
    /// Permalink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Attached image or thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    /// Embeddable player HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
    /// Engagement counters.
    #[serde(flatten)]
    pub counters: BTreeMap<String, u64>,
}

impl Post {
    /// Creates a post with the required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, date: i64) -> Self {
        Self {
            id: id.into(),
            title: None,
            text: text.into(),
            date,
            link: None,
            media: None,
            embed: None,
            counters: BTreeMap::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the permalink.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Attaches media.
    #[must_use]
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Sets the embeddable player HTML.
    #[must_use]
    pub fn with_embed(mut self, embed: impl Into<String>) -> Self {
        self.embed = Some(embed.into());
        self
    }

    /// Sets an engagement counter.
    #[must_use]
    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }

    /// Returns an engagement counter by name.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }
}

/// Image or thumbnail attached to a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Image URL.
    pub thumbnail: String,
    /// Width in pixels, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Media {
    /// Creates media with unknown dimensions.
    #[must_use]
    pub fn new(thumbnail: impl Into<String>) -> Self {
        Self {
            thumbnail: thumbnail.into(),
            width: None,
            height: None,
        }
    }

    /// Sets the dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}
