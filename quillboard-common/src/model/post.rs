use crate::model::{
    Id,
    user::{Byline, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected},
};
use std::{cmp::Reverse, collections::BTreeSet, fmt::Display};
use thiserror::Error;
use time::UtcDateTime;

pub const SLUG_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// URL-safe, immutable post key.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The slug is invalid: {0:?}")]
pub struct InvalidSlugError(String);

impl Slug {
    pub fn new(slug: impl Into<String>) -> Result<Self, InvalidSlugError> {
        let slug = slug.into();
        let valid = !slug.is_empty()
            && slug.chars().count() <= SLUG_MAX_LEN
            && !slug
                .chars()
                .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace() || c.is_control());

        if valid {
            Ok(Slug(slug))
        } else {
            Err(InvalidSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for Slug {
    type Err = InvalidSlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slug::new(s)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Slug::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Slug"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub slug: Slug,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub photos: Vec<String>,
    pub byline: Byline,
    /// User ids that liked the post. Empty when the backend only sent a count.
    pub likes: BTreeSet<Id<UserMarker>>,
    pub like_count: u64,
    pub views: u64,
    pub comment_count: u64,
    pub published: bool,
    pub created_at: Option<UtcDateTime>,
    pub updated_at: Option<UtcDateTime>,
}

impl Post {
    #[must_use]
    pub fn likes_count(&self) -> u64 {
        self.like_count
    }
}

/// Body of a create or update request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostContent {
    pub title: String,
    pub description: String,
    #[serde(serialize_with = "serialize_joined_tags")]
    pub tags: Vec<String>,
    #[serde(rename = "photo")]
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

// The backend expects tags as one comma separated string.
fn serialize_joined_tags<S>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&tags.join(", "))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Tag {
    pub name: String,
    pub count: Option<u64>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum SortOrder {
    #[default]
    Latest,
    Popular,
}

impl SortOrder {
    /// Sorts in place. Posts without a creation time sort last under
    /// [`SortOrder::Latest`].
    pub fn sort(self, posts: &mut [Post]) {
        match self {
            SortOrder::Latest => posts.sort_by_key(|post| Reverse(post.created_at)),
            SortOrder::Popular => posts.sort_by_key(|post| {
                (
                    Reverse(post.like_count),
                    Reverse(post.views),
                    Reverse(post.created_at),
                )
            }),
        }
    }
}
