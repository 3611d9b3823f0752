use crate::model::{Id, user::Byline};
use serde::Serialize;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    /// Parent post as the backend referenced it (slug or id).
    pub post: Option<String>,
    pub text: String,
    pub byline: Byline,
    pub created_at: Option<UtcDateTime>,
    pub updated_at: Option<UtcDateTime>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct CommentDraft {
    pub text: String,
    pub anonymous: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct CommentEdit {
    pub text: String,
}

/// Newest first. Comments without a creation time keep their relative order
/// at the end.
pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by_key(|comment| std::cmp::Reverse(comment.created_at));
}
