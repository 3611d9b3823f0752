//! Backend payloads as they arrive on the wire, and their conversion into the
//! canonical model.
//!
//! The backend is inconsistent about shapes: `likes` is sometimes a list of
//! user ids and sometimes a bare number, `author` is either a populated user
//! or an id, `tags` is either a list or a comma joined string. Everything
//! past this module only sees the canonical types.

use quillboard_common::model::{
    Id, MalformedResponse,
    comment::Comment,
    post::{Post, Slug, Tag},
    user::{Author, Byline, User, UserMarker},
};
use serde::{Deserialize, de::DeserializeOwned, de::IgnoredAny};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use time::{OffsetDateTime, UtcDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CountRecord {
    Count(u64),
    Other(IgnoredAny),
}

impl CountRecord {
    fn get(&self) -> Option<u64> {
        match self {
            CountRecord::Count(count) => Some(*count),
            CountRecord::Other(_) => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LikesRecord {
    Count(u64),
    Ids(Vec<UserRefRecord>),
    Other(IgnoredAny),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsRecord {
    like_count: Option<CountRecord>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TagsRecord {
    List(Vec<String>),
    Joined(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PhotosRecord {
    Many(Vec<String>),
    One(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRecord {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    fullname: Option<String>,
    email: Option<String>,
    avatar: Option<String>,
    created_at: Option<String>,
}

/// A user either populated or referenced by id.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserRefRecord {
    Id(String),
    User(UserRecord),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PostRefRecord {
    Id(String),
    Post {
        #[serde(rename = "_id", alias = "id")]
        id: Option<String>,
        slug: Option<String>,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostRecord {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    slug: Option<String>,
    title: Option<String>,
    description: Option<String>,
    tags: Option<TagsRecord>,
    photo: Option<PhotosRecord>,
    views: Option<CountRecord>,
    likes: Option<LikesRecord>,
    likes_count: Option<CountRecord>,
    stats: Option<StatsRecord>,
    comments_count: Option<CountRecord>,
    author: Option<UserRefRecord>,
    anonymous: Option<bool>,
    anonymous_author: Option<String>,
    is_published: Option<bool>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentRecord {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    text: Option<String>,
    post: Option<PostRefRecord>,
    author: Option<UserRefRecord>,
    anonymous: Option<bool>,
    anonymous_author: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TagRecord {
    Name(String),
    Counted {
        name: String,
        count: Option<CountRecord>,
    },
}

/// Login answers with the user fields inline next to the token, register
/// nests them under `user`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SessionRecord {
    pub token: String,
    user: Option<UserRecord>,
    #[serde(flatten)]
    inline: UserRecord,
}

impl SessionRecord {
    pub(crate) fn into_parts(self) -> Result<(String, User), MalformedResponse> {
        let user = User::try_from(self.user.unwrap_or(self.inline))?;
        Ok((self.token, user))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct UploadRecord {
    pub url: String,
}

fn timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<UtcDateTime>, MalformedResponse> {
    value
        .map(|value| match OffsetDateTime::parse(&value, &Rfc3339) {
            Ok(date_time) => Ok(date_time.to_utc()),
            Err(_) => Err(MalformedResponse::Timestamp { field, value }),
        })
        .transpose()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn byline(
    anonymous: Option<bool>,
    anonymous_author: Option<String>,
    author: Option<UserRefRecord>,
) -> Byline {
    if anonymous == Some(true) {
        return Byline::Anonymous {
            display_name: non_empty(anonymous_author),
        };
    }

    match author.and_then(UserRefRecord::into_author) {
        Some(author) => Byline::Author(author),
        None => Byline::Unattributed,
    }
}

/// Count precedence: numeric `likes`, then `likesCount`, then
/// `stats.likeCount`, then the number of user ids in a `likes` list.
fn like_count(
    likes: Option<&LikesRecord>,
    listed: Option<u64>,
    likes_count: Option<&CountRecord>,
    stats: Option<&StatsRecord>,
) -> u64 {
    if let Some(LikesRecord::Count(count)) = likes {
        return *count;
    }
    let reported = likes_count.and_then(CountRecord::get).or_else(|| {
        stats
            .and_then(|stats| stats.like_count.as_ref())
            .and_then(CountRecord::get)
    });

    match (reported, listed) {
        (Some(reported), Some(listed)) if reported != listed => {
            debug!(reported, listed, "Backend reported conflicting like counts");
            reported
        }
        (Some(count), _) | (None, Some(count)) => count,
        (None, None) => 0,
    }
}

impl UserRefRecord {
    fn into_author(self) -> Option<Author> {
        match self {
            UserRefRecord::Id(id) => Some(Author {
                id: Id::new(id)?,
                fullname: None,
                avatar: None,
            }),
            UserRefRecord::User(user) => Some(Author {
                id: Id::new(user.id?)?,
                fullname: non_empty(user.fullname),
                avatar: non_empty(user.avatar),
            }),
        }
    }

    fn into_id<Marker>(self) -> Option<Id<Marker>> {
        match self {
            UserRefRecord::Id(id) => Id::new(id),
            UserRefRecord::User(user) => Id::new(user.id?),
        }
    }
}

impl TryFrom<UserRecord> for User {
    type Error = MalformedResponse;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value
                .id
                .and_then(Id::new)
                .ok_or(MalformedResponse::MissingField("_id"))?,
            fullname: value.fullname.unwrap_or_default(),
            email: non_empty(value.email),
            avatar: non_empty(value.avatar),
            created_at: timestamp("createdAt", value.created_at)?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = MalformedResponse;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let id = value
            .id
            .and_then(Id::new)
            .ok_or(MalformedResponse::MissingField("_id"))?;
        let slug = non_empty(value.slug).ok_or(MalformedResponse::MissingField("slug"))?;

        let likes: Option<BTreeSet<Id<UserMarker>>> = match &value.likes {
            Some(LikesRecord::Ids(ids)) => Some(
                ids.iter()
                    .cloned()
                    .filter_map(UserRefRecord::into_id)
                    .collect(),
            ),
            _ => None,
        };
        let like_count = like_count(
            value.likes.as_ref(),
            likes.as_ref().map(|likes| likes.len() as u64),
            value.likes_count.as_ref(),
            value.stats.as_ref(),
        );
        let likes = likes.unwrap_or_default();

        let tags = match value.tags {
            Some(TagsRecord::List(tags)) => tags
                .into_iter()
                .filter(|tag| !tag.trim().is_empty())
                .collect(),
            Some(TagsRecord::Joined(joined)) => joined
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect(),
            None => Vec::new(),
        };
        let photos = match value.photo {
            Some(PhotosRecord::Many(photos)) => photos,
            Some(PhotosRecord::One(photo)) => non_empty(Some(photo)).into_iter().collect(),
            None => Vec::new(),
        };

        Ok(Self {
            id,
            slug: Slug::new(slug)?,
            title: value.title.unwrap_or_default(),
            description: value.description.unwrap_or_default(),
            tags,
            photos,
            byline: byline(value.anonymous, value.anonymous_author, value.author),
            likes,
            like_count,
            views: value.views.as_ref().and_then(CountRecord::get).unwrap_or(0),
            comment_count: value
                .comments_count
                .as_ref()
                .and_then(CountRecord::get)
                .unwrap_or(0),
            published: value.is_published.unwrap_or(true),
            created_at: timestamp("createdAt", value.created_at)?,
            updated_at: timestamp("updatedAt", value.updated_at)?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = MalformedResponse;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        let post = value.post.and_then(|post| match post {
            PostRefRecord::Id(id) => non_empty(Some(id)),
            PostRefRecord::Post { id, slug } => non_empty(slug).or_else(|| non_empty(id)),
        });

        Ok(Self {
            id: value
                .id
                .and_then(Id::new)
                .ok_or(MalformedResponse::MissingField("_id"))?,
            post,
            text: value.text.unwrap_or_default(),
            byline: byline(value.anonymous, value.anonymous_author, value.author),
            created_at: timestamp("createdAt", value.created_at)?,
            updated_at: timestamp("updatedAt", value.updated_at)?,
        })
    }
}

impl TryFrom<TagRecord> for Tag {
    type Error = MalformedResponse;

    fn try_from(value: TagRecord) -> Result<Self, Self::Error> {
        let (name, count) = match value {
            TagRecord::Name(name) => (name, None),
            TagRecord::Counted { name, count } => (name, count.as_ref().and_then(CountRecord::get)),
        };
        let name = non_empty(Some(name)).ok_or(MalformedResponse::MissingField("name"))?;

        Ok(Self {
            name: name.trim().to_owned(),
            count,
        })
    }
}

fn adapt<R, T>(value: Value) -> Result<T, MalformedResponse>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = MalformedResponse>,
{
    let record: R = serde_json::from_value(value)?;
    T::try_from(record)
}

/// Adapts each item on its own, dropping the ones that cannot be adapted.
fn adapt_each<R, T>(kind: &'static str, values: Vec<Value>) -> Vec<T>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = MalformedResponse>,
{
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match adapt::<R, T>(value) {
            Ok(item) => Some(item),
            Err(error) => {
                warn!(kind, index, %error, "Skipping malformed item");
                None
            }
        })
        .collect()
}

/// A list endpoint must answer with an array.
pub(crate) fn into_items(value: Value) -> Result<Vec<Value>, MalformedResponse> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(MalformedResponse::Shape(format!(
            "expected an array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn adapt_post(value: Value) -> Result<Post, MalformedResponse> {
    adapt::<PostRecord, _>(value)
}

#[must_use]
pub fn adapt_posts(values: Vec<Value>) -> Vec<Post> {
    adapt_each::<PostRecord, _>("post", values)
}

pub fn adapt_comment(value: Value) -> Result<Comment, MalformedResponse> {
    adapt::<CommentRecord, _>(value)
}

#[must_use]
pub fn adapt_comments(values: Vec<Value>) -> Vec<Comment> {
    adapt_each::<CommentRecord, _>("comment", values)
}

#[must_use]
pub fn adapt_tags(values: Vec<Value>) -> Vec<Tag> {
    adapt_each::<TagRecord, _>("tag", values)
}

pub fn adapt_user(value: Value) -> Result<User, MalformedResponse> {
    adapt::<UserRecord, _>(value)
}

/// What a rejected request said about itself.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct ErrorDetails {
    pub message: Option<String>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
struct FieldErrorRecord {
    #[serde(alias = "param", alias = "field")]
    path: Option<String>,
    #[serde(alias = "message")]
    msg: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum FieldMessageRecord {
    Text(String),
    Detail { message: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum FieldErrorsRecord {
    List(Vec<FieldErrorRecord>),
    Map(BTreeMap<String, FieldMessageRecord>),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBodyRecord {
    Fields(Vec<FieldErrorRecord>),
    Detailed {
        message: Option<String>,
        errors: Option<FieldErrorsRecord>,
    },
}

impl ErrorDetails {
    pub(crate) fn parse(body: &[u8]) -> Self {
        let Ok(record) = serde_json::from_slice::<ErrorBodyRecord>(body) else {
            let text = String::from_utf8_lossy(body).trim().to_owned();
            return Self {
                message: (!text.is_empty()).then_some(text),
                fields: BTreeMap::new(),
            };
        };

        let (message, errors) = match record {
            ErrorBodyRecord::Fields(list) => (None, Some(FieldErrorsRecord::List(list))),
            ErrorBodyRecord::Detailed { message, errors } => (message, errors),
        };
        let fields = match errors {
            Some(FieldErrorsRecord::List(list)) => list
                .into_iter()
                .filter_map(|error| Some((error.path?, error.msg?)))
                .collect(),
            Some(FieldErrorsRecord::Map(map)) => map
                .into_iter()
                .map(|(field, message)| match message {
                    FieldMessageRecord::Text(text) => (field, text),
                    FieldMessageRecord::Detail { message } => (field, message),
                })
                .collect(),
            None => BTreeMap::new(),
        };

        Self { message, fields }
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{
        ErrorDetails, SessionRecord, adapt_comment, adapt_post, adapt_posts, adapt_tags,
    };
    use quillboard_common::{
        model::{Id, MalformedResponse, user::Byline},
        reconcile::{has_user_liked, is_post_author},
    };
    use serde_json::json;
    use time::macros::utc_datetime;

    fn raw(slug: &str) -> serde_json::Value {
        json!({
            "_id": format!("id-{slug}"),
            "slug": slug,
            "title": "Salom",
            "description": "# Heading",
            "views": 12,
        })
    }

    #[test]
    fn likes_as_id_list() {
        let mut value = raw("a");
        value["likes"] = json!(["u1", "u2", "u3"]);
        let post = adapt_post(value).unwrap();

        assert_eq!(post.likes_count(), 3);
        for id in ["u1", "u2", "u3"] {
            assert!(has_user_liked(&post, &Id::new(id).unwrap()));
        }
        assert!(!has_user_liked(&post, &Id::new("u4").unwrap()));
    }

    #[test]
    fn likes_as_number() {
        let mut value = raw("a");
        value["likes"] = json!(7);
        let post = adapt_post(value).unwrap();

        assert!(post.likes.is_empty());
        assert_eq!(post.likes_count(), 7);
        assert!(!has_user_liked(&post, &Id::new("u1").unwrap()));
    }

    #[test]
    fn like_count_precedence() {
        let mut value = raw("a");
        value["likesCount"] = json!(3);
        value["stats"] = json!({ "likeCount": 5 });
        assert_eq!(adapt_post(value).unwrap().likes_count(), 3);

        let mut value = raw("a");
        value["stats"] = json!({ "likeCount": 5 });
        value["likes"] = json!(["u1"]);
        let post = adapt_post(value).unwrap();
        assert_eq!(post.likes_count(), 5);
        assert_eq!(post.likes.len(), 1);

        let mut value = raw("a");
        value["likes"] = json!(2);
        value["likesCount"] = json!(9);
        assert_eq!(adapt_post(value).unwrap().likes_count(), 2);

        assert_eq!(adapt_post(raw("a")).unwrap().likes_count(), 0);
    }

    #[test]
    fn like_list_counts_only_usable_ids() {
        let mut value = raw("a");
        value["likes"] = json!(["u1", { "fullname": "no id" }, "", { "_id": "u2" }]);
        let post = adapt_post(value).unwrap();
        assert_eq!(post.likes.len(), 2);
        assert_eq!(post.likes_count(), 2);
    }

    #[test]
    fn unexpected_like_shapes_are_ignored() {
        let mut value = raw("a");
        value["likes"] = json!({ "weird": true });
        value["likesCount"] = json!("many");
        let post = adapt_post(value).unwrap();
        assert_eq!(post.likes_count(), 0);
        assert!(post.likes.is_empty());
    }

    #[test]
    fn passes_through_server_counters() {
        let mut value = raw("a");
        value["commentsCount"] = json!(4);
        let post = adapt_post(value).unwrap();
        assert_eq!(post.views, 12);
        assert_eq!(post.comment_count, 4);
        assert!(post.published);

        assert_eq!(adapt_post(raw("b")).unwrap().comment_count, 0);
    }

    #[test]
    fn tags_and_photos_in_either_shape() {
        let mut value = raw("a");
        value["tags"] = json!("rust, web ,, blog");
        value["photo"] = json!("/images/1");
        let post = adapt_post(value).unwrap();
        assert_eq!(post.tags, ["rust", "web", "blog"]);
        assert_eq!(post.photos, ["/images/1"]);

        let mut value = raw("a");
        value["tags"] = json!(["rust", " "]);
        value["photo"] = json!(["/images/1", "/images/2"]);
        let post = adapt_post(value).unwrap();
        assert_eq!(post.tags, ["rust"]);
        assert_eq!(post.photos.len(), 2);
    }

    #[test]
    fn missing_identity_is_malformed() {
        let mut value = raw("a");
        value.as_object_mut().unwrap().remove("slug");
        assert_eq!(
            adapt_post(value),
            Err(MalformedResponse::MissingField("slug"))
        );

        let mut value = raw("a");
        value["_id"] = json!("");
        assert_eq!(adapt_post(value), Err(MalformedResponse::MissingField("_id")));

        let mut value = raw("a");
        value["slug"] = json!("has spaces");
        assert!(matches!(adapt_post(value), Err(MalformedResponse::Slug(_))));
    }

    #[test]
    fn batch_skips_only_malformed_items() {
        let mut second = raw("b");
        second.as_object_mut().unwrap().remove("slug");
        let posts = adapt_posts(vec![raw("a"), second, raw("c"), json!(42)]);

        let slugs: Vec<_> = posts.iter().map(|post| post.slug.get()).collect();
        assert_eq!(slugs, ["a", "c"]);
    }

    #[test]
    fn anonymous_posts_hide_their_author() {
        let mut value = raw("a");
        value["anonymous"] = json!(true);
        value["anonymousAuthor"] = json!("Mehmon");
        value["author"] = json!({ "_id": "u1", "fullname": "Real Name" });
        let post = adapt_post(value).unwrap();

        assert_eq!(
            post.byline,
            Byline::Anonymous {
                display_name: Some("Mehmon".to_owned())
            }
        );
        assert!(!is_post_author(Some(&Id::new("u1").unwrap()), &post));
    }

    #[test]
    fn author_as_object_or_id() {
        let mut value = raw("a");
        value["author"] = json!({ "_id": "u1", "fullname": "Ali", "avatar": "" });
        let post = adapt_post(value).unwrap();
        assert!(is_post_author(Some(&Id::new("u1").unwrap()), &post));
        assert_eq!(post.byline.display_name(), Some("Ali"));

        let mut value = raw("a");
        value["author"] = json!("u2");
        let post = adapt_post(value).unwrap();
        assert!(is_post_author(Some(&Id::new("u2").unwrap()), &post));

        assert_eq!(adapt_post(raw("a")).unwrap().byline, Byline::Unattributed);
    }

    #[test]
    fn timestamps() {
        let mut value = raw("a");
        value["createdAt"] = json!("2025-03-01T10:00:00.000Z");
        value["updatedAt"] = json!("2025-03-01T12:30:00+02:00");
        let post = adapt_post(value).unwrap();
        assert_eq!(post.created_at, Some(utc_datetime!(2025-03-01 10:00)));
        assert_eq!(post.updated_at, Some(utc_datetime!(2025-03-01 10:30)));

        let mut value = raw("a");
        value["createdAt"] = json!("yesterday");
        assert!(matches!(
            adapt_post(value),
            Err(MalformedResponse::Timestamp {
                field: "createdAt",
                ..
            })
        ));
    }

    #[test]
    fn comments() {
        let comment = adapt_comment(json!({
            "_id": "c1",
            "text": "Zo'r maqola",
            "post": { "_id": "p1", "slug": "a" },
            "author": { "_id": "u1", "fullname": "Ali" },
        }))
        .unwrap();
        assert_eq!(comment.post.as_deref(), Some("a"));
        assert_eq!(comment.byline.author_id().map(Id::get), Some("u1"));

        let anonymous = adapt_comment(json!({
            "_id": "c2",
            "text": "hi",
            "post": "p1",
            "anonymous": true,
            "author": "u1",
        }))
        .unwrap();
        assert_eq!(anonymous.post.as_deref(), Some("p1"));
        assert_eq!(anonymous.byline, Byline::Anonymous { display_name: None });

        assert!(adapt_comment(json!({ "text": "no id" })).is_err());
    }

    #[test]
    fn tags_as_names_or_counts() {
        let tags = adapt_tags(vec![
            json!("rust"),
            json!({ "name": "web", "count": 4 }),
            json!({ "name": "" }),
            json!(17),
        ]);

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "rust");
        assert_eq!(tags[0].count, None);
        assert_eq!(tags[1].name, "web");
        assert_eq!(tags[1].count, Some(4));
    }

    #[test]
    fn session_payloads() {
        let inline: SessionRecord =
            serde_json::from_value(json!({ "token": "t1", "_id": "u1", "fullname": "Ali" }))
                .unwrap();
        let (token, user) = inline.into_parts().unwrap();
        assert_eq!(token, "t1");
        assert_eq!(user.fullname, "Ali");

        let nested: SessionRecord = serde_json::from_value(
            json!({ "token": "t2", "user": { "_id": "u2", "fullname": "Vali" } }),
        )
        .unwrap();
        assert_eq!(nested.into_parts().unwrap().1.id.get(), "u2");

        let missing: SessionRecord = serde_json::from_value(json!({ "token": "t3" })).unwrap();
        assert!(missing.into_parts().is_err());
    }

    #[test]
    fn error_details() {
        let details = ErrorDetails::parse(
            br#"{"message":"Validation failed","errors":[{"path":"text","msg":"Comment is empty"}]}"#,
        );
        assert_eq!(details.message.as_deref(), Some("Validation failed"));
        assert_eq!(details.fields["text"], "Comment is empty");

        let details = ErrorDetails::parse(br#"[{"param":"title","msg":"Too short"}]"#);
        assert_eq!(details.message, None);
        assert_eq!(details.fields["title"], "Too short");

        let details = ErrorDetails::parse(br#"{"errors":{"email":{"message":"Taken"}}}"#);
        assert_eq!(details.fields["email"], "Taken");

        let details = ErrorDetails::parse(b"Bad Gateway");
        assert_eq!(details.message.as_deref(), Some("Bad Gateway"));
    }
}
