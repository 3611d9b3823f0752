//! Counts and ownership checks shared by every view of a post.

use crate::model::{
    Id,
    comment::Comment,
    post::Post,
    user::{Byline, UserMarker},
};

/// An unconfirmed local like toggle that is not yet reflected in the post.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum LikeDelta {
    Unlike,
    #[default]
    None,
    Like,
}

impl LikeDelta {
    /// The delta a toggle produces given whether the viewer currently likes
    /// the post.
    #[must_use]
    pub fn toggle_from(currently_liked: bool) -> Self {
        if currently_liked {
            LikeDelta::Unlike
        } else {
            LikeDelta::Like
        }
    }

    #[must_use]
    pub fn get(self) -> i8 {
        match self {
            LikeDelta::Unlike => -1,
            LikeDelta::None => 0,
            LikeDelta::Like => 1,
        }
    }
}

#[must_use]
pub fn like_count(post: &Post, delta: LikeDelta) -> u64 {
    match delta {
        LikeDelta::Unlike => post.likes_count().saturating_sub(1),
        LikeDelta::None => post.likes_count(),
        LikeDelta::Like => post.likes_count().saturating_add(1),
    }
}

/// Only answers from the like-identity set. A post that arrived with just a
/// count reports `false` for everyone.
#[must_use]
pub fn has_user_liked(post: &Post, user_id: &Id<UserMarker>) -> bool {
    post.likes.contains(user_id)
}

/// A fully fetched comment list is ground truth over the post's counter.
#[must_use]
pub fn comment_count(post: &Post, local_comments: Option<&[Comment]>) -> u64 {
    match local_comments {
        Some(comments) => comments.len() as u64,
        None => post.comment_count,
    }
}

#[must_use]
pub fn is_author(user_id: Option<&Id<UserMarker>>, byline: &Byline) -> bool {
    match (user_id, byline.author_id()) {
        (Some(user_id), Some(author_id)) => user_id == author_id,
        _ => false,
    }
}

#[must_use]
pub fn is_post_author(user_id: Option<&Id<UserMarker>>, post: &Post) -> bool {
    is_author(user_id, &post.byline)
}

/// Edits and deletes are reserved to the named author.
#[must_use]
pub fn can_modify_comment(user_id: Option<&Id<UserMarker>>, comment: &Comment) -> bool {
    is_author(user_id, &comment.byline)
}
