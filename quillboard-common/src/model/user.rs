use crate::model::Id;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub fullname: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub created_at: Option<UtcDateTime>,
}

/// The public face of whoever wrote a post or comment.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Author {
    pub id: Id<UserMarker>,
    pub fullname: Option<String>,
    pub avatar: Option<String>,
}

/// Who a post or comment is attributed to.
///
/// An anonymous entity never carries the underlying author, so ownership
/// checks cannot accidentally match against it.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Byline {
    Author(Author),
    Anonymous { display_name: Option<String> },
    Unattributed,
}

impl Byline {
    #[must_use]
    pub fn author_id(&self) -> Option<&Id<UserMarker>> {
        match self {
            Byline::Author(author) => Some(&author.id),
            Byline::Anonymous { .. } | Byline::Unattributed => None,
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Byline::Anonymous { .. })
    }

    /// Name to show next to the entity, if there is one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Byline::Author(author) => author.fullname.as_deref(),
            Byline::Anonymous { display_name } => display_name.as_deref(),
            Byline::Unattributed => None,
        }
    }
}

impl From<User> for Author {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            fullname: Some(value.fullname),
            avatar: value.avatar,
        }
    }
}
