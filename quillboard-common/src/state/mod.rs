//! View state and the optimistic mutation state machine.
//!
//! Nothing here performs I/O. Each `begin_*` call validates a user action
//! against the current state, applies whatever is shown immediately and
//! returns an [`Effect`] naming the request to issue. The caller reports the
//! outcome back through the matching `commit_*` call or [`Views::roll_back`].
//! Outcomes for views that were unmounted or re-queried in the meantime come
//! back as [`Delivery::Stale`] and change nothing.

mod comments;
mod likes;

pub use comments::CommentThread;

use crate::{
    model::{
        Id,
        comment::{Comment, CommentDraft, CommentEdit, CommentMarker},
        post::{Post, Slug, SortOrder},
        user::UserMarker,
    },
    reconcile::{self, LikeDelta},
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ViewId(u64);

/// What a view is showing. A view that changes its key drops everything it
/// fetched under the old one.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum QueryKey {
    Feed(SortOrder),
    Tag(String),
    Post(Slug),
    Comments(Slug),
    LatestComments,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// Result of handing a fetch or mutation outcome back to the store.
#[must_use]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Delivery {
    Applied,
    Stale,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FetchTicket {
    view: ViewId,
    seq: u64,
}

impl FetchTicket {
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Target {
    Like(Slug),
    AddComment(Slug),
    Comment(Id<CommentMarker>),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MutationTicket {
    view: ViewId,
    query: QueryKey,
    target: Target,
}

impl MutationTicket {
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }
}

/// A request the caller must issue on behalf of the store.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Request {
    ToggleLike { slug: Slug },
    AddComment { slug: Slug, draft: CommentDraft },
    EditComment { id: Id<CommentMarker>, edit: CommentEdit },
    DeleteComment { id: Id<CommentMarker> },
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Effect {
    pub ticket: MutationTicket,
    pub request: Request,
}

/// A user action the current state does not allow.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum Rejection {
    #[error("View {0:?} is not mounted")]
    UnknownView(ViewId),
    #[error("Post {0} is not shown in this view")]
    UnknownPost(Slug),
    #[error("Comment {0} is not shown in this view")]
    UnknownComment(Id<CommentMarker>),
    #[error("This view has no loaded comment list")]
    NoCommentList,
    #[error("Comment {0} already has a change in flight")]
    Busy(Id<CommentMarker>),
    #[error("Only the author can change comment {0}")]
    NotAuthor(Id<CommentMarker>),
    #[error("Anonymous comment {0} cannot be changed")]
    Anonymous(Id<CommentMarker>),
    #[error("Comment text must not be empty")]
    EmptyComment,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostEntry {
    pub post: Post,
    pub like: MutationState,
    pub delta: LikeDelta,
}

impl PostEntry {
    fn new(post: Post) -> Self {
        Self {
            post,
            like: MutationState::Idle,
            delta: LikeDelta::None,
        }
    }

    #[must_use]
    pub fn like_count(&self) -> u64 {
        reconcile::like_count(&self.post, self.delta)
    }

    /// Takes the server's version of the post. The comment count stays, as
    /// it may come from a comment list fetched or changed since.
    fn replace_post(&mut self, post: Post) {
        let comment_count = self.post.comment_count;
        self.post = post;
        self.post.comment_count = comment_count;
    }

    /// Whether the viewer's like is shown as active, pending toggle included.
    #[must_use]
    pub fn liked_by(&self, user_id: &Id<UserMarker>) -> bool {
        match self.delta {
            LikeDelta::Like => true,
            LikeDelta::Unlike => false,
            LikeDelta::None => reconcile::has_user_liked(&self.post, user_id),
        }
    }
}

#[derive(Clone, Debug)]
struct View {
    query: QueryKey,
    fetch_seq: u64,
    posts: Vec<PostEntry>,
    thread: Option<CommentThread>,
}

impl View {
    fn entry_mut(&mut self, slug: &Slug) -> Option<&mut PostEntry> {
        self.posts.iter_mut().find(|entry| entry.post.slug == *slug)
    }
}

/// Every mounted view and what it currently shows.
///
/// Each effect handed out must be settled through its `commit_*` call or
/// [`Views::roll_back`], even after its view is gone, since that releases
/// the store-wide gate it holds.
#[derive(Clone, Debug, Default)]
pub struct Views {
    next_id: u64,
    views: HashMap<ViewId, View>,
    /// Posts with a like request in flight, whichever view sent it.
    likes_in_flight: HashSet<Slug>,
    /// Comments with an edit or delete in flight, whichever view sent it.
    comments_in_flight: HashSet<Id<CommentMarker>>,
}

impl Views {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, query: QueryKey) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.views.insert(
            id,
            View {
                query,
                fetch_seq: 0,
                posts: Vec::new(),
                thread: None,
            },
        );
        debug!(view = ?id, "Mounted view");
        id
    }

    /// Returns whether the view was mounted.
    pub fn unmount(&mut self, view: ViewId) -> bool {
        debug!(?view, "Unmounting view");
        self.views.remove(&view).is_some()
    }

    #[must_use]
    pub fn is_mounted(&self, view: ViewId) -> bool {
        self.views.contains_key(&view)
    }

    #[must_use]
    pub fn query(&self, view: ViewId) -> Option<&QueryKey> {
        self.views.get(&view).map(|view| &view.query)
    }

    #[must_use]
    pub fn posts(&self, view: ViewId) -> Option<&[PostEntry]> {
        self.views.get(&view).map(|view| view.posts.as_slice())
    }

    #[must_use]
    pub fn post(&self, view: ViewId, slug: &Slug) -> Option<&PostEntry> {
        self.views
            .get(&view)?
            .posts
            .iter()
            .find(|entry| entry.post.slug == *slug)
    }

    #[must_use]
    pub fn comments(&self, view: ViewId) -> Option<&[Comment]> {
        self.views
            .get(&view)?
            .thread
            .as_ref()
            .map(|thread| thread.comments.as_slice())
    }

    /// Comment count of `slug` as shown in `view`. A loaded comment list of
    /// the same post wins over the post's counter.
    #[must_use]
    pub fn comment_count(&self, view: ViewId, slug: &Slug) -> Option<u64> {
        let view = self.views.get(&view)?;
        let thread = view
            .thread
            .as_ref()
            .filter(|thread| thread.slug.as_ref() == Some(slug));

        match (view.posts.iter().find(|e| e.post.slug == *slug), thread) {
            (Some(entry), thread) => Some(reconcile::comment_count(
                &entry.post,
                thread.map(|thread| thread.comments.as_slice()),
            )),
            (None, Some(thread)) => Some(thread.comments.len() as u64),
            (None, None) => None,
        }
    }

    /// Starts a fetch for `view`. Switching to a different query key drops
    /// the view's data, and any earlier ticket becomes stale.
    pub fn begin_fetch(&mut self, view: ViewId, query: QueryKey) -> Result<FetchTicket, Rejection> {
        let state = self
            .views
            .get_mut(&view)
            .ok_or(Rejection::UnknownView(view))?;

        if state.query != query {
            debug!(?view, from = ?state.query, to = ?query, "View changed query");
            state.query = query;
            state.posts.clear();
            state.thread = None;
        }
        state.fetch_seq += 1;

        Ok(FetchTicket {
            view,
            seq: state.fetch_seq,
        })
    }

    /// Ticket of the view's latest fetch, if it fetched anything yet.
    #[must_use]
    pub fn current_ticket(&self, view: ViewId) -> Option<FetchTicket> {
        let state = self.views.get(&view)?;
        (state.fetch_seq > 0).then_some(FetchTicket {
            view,
            seq: state.fetch_seq,
        })
    }

    #[must_use]
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.views
            .get(&ticket.view)
            .is_some_and(|view| view.fetch_seq == ticket.seq)
    }

    /// Replaces the posts of the view. Entries with a like toggle in flight
    /// keep their pending state so the outstanding request can still land.
    pub fn complete_posts(&mut self, ticket: &FetchTicket, posts: Vec<Post>) -> Delivery {
        let Some(view) = self.current_view_mut(ticket) else {
            return Delivery::Stale;
        };

        let previous = std::mem::take(&mut view.posts);
        view.posts = posts
            .into_iter()
            .map(|post| {
                match previous
                    .iter()
                    .find(|old| old.post.slug == post.slug && old.like == MutationState::Pending)
                {
                    Some(old) => PostEntry {
                        post,
                        like: old.like,
                        delta: old.delta,
                    },
                    None => PostEntry::new(post),
                }
            })
            .collect();

        Delivery::Applied
    }

    /// Records a comment count fetched separately for a post of a list view.
    pub fn refine_comment_count(&mut self, ticket: &FetchTicket, slug: &Slug, count: u64) -> Delivery {
        let Some(view) = self.current_view_mut(ticket) else {
            return Delivery::Stale;
        };
        match view.entry_mut(slug) {
            Some(entry) => {
                entry.post.comment_count = count;
                Delivery::Applied
            }
            None => Delivery::Stale,
        }
    }

    fn current_view_mut(&mut self, ticket: &FetchTicket) -> Option<&mut View> {
        let view = self.views.get_mut(&ticket.view)?;
        if view.fetch_seq == ticket.seq {
            Some(view)
        } else {
            debug!(view = ?ticket.view, seq = ticket.seq, "Discarding stale fetch");
            None
        }
    }

    fn mutation_view_mut(&mut self, ticket: &MutationTicket) -> Option<&mut View> {
        let view = self
            .views
            .get_mut(&ticket.view)
            .filter(|view| view.query == ticket.query);
        if view.is_none() {
            debug!(view = ?ticket.view, target = ?ticket.target, "Discarding mutation result");
        }
        view
    }

    fn ticket(&self, view: ViewId, target: Target) -> Result<MutationTicket, Rejection> {
        let query = self
            .views
            .get(&view)
            .ok_or(Rejection::UnknownView(view))?
            .query
            .clone();

        Ok(MutationTicket {
            view,
            query,
            target,
        })
    }

    /// Writes `count` as the comment count of `slug` in every mounted view.
    fn propagate_comment_count(&mut self, slug: &Slug, count: u64) {
        for view in self.views.values_mut() {
            if let Some(entry) = view.entry_mut(slug) {
                entry.post.comment_count = count;
            }
        }
    }

    /// Finds the post a comment refers to by slug or id.
    fn resolve_post(&self, reference: &str) -> Option<Slug> {
        self.views
            .values()
            .flat_map(|view| &view.posts)
            .find(|entry| entry.post.slug.get() == reference || entry.post.id.get() == reference)
            .map(|entry| entry.post.slug.clone())
            .or_else(|| Slug::new(reference).ok())
    }

    /// Brings every view's count for `slug` in line after a comment went away.
    /// A loaded thread of the post is the truth; without one the counters
    /// each lose one.
    fn recount_comments(&mut self, slug: &Slug) {
        let thread_count = self
            .views
            .values()
            .filter_map(|view| view.thread.as_ref())
            .find(|thread| thread.slug.as_ref() == Some(slug))
            .map(|thread| thread.comments.len() as u64);

        match thread_count {
            Some(count) => self.propagate_comment_count(slug, count),
            None => {
                for view in self.views.values_mut() {
                    if let Some(entry) = view.entry_mut(slug) {
                        entry.post.comment_count = entry.post.comment_count.saturating_sub(1);
                    }
                }
            }
        }
    }

    /// Opens the gate `target` held.
    fn release(&mut self, target: &Target) {
        match target {
            Target::Like(slug) => {
                self.likes_in_flight.remove(slug);
            }
            Target::Comment(id) => {
                self.comments_in_flight.remove(id);
            }
            Target::AddComment(_) => {}
        }
    }

    /// Reverts whatever the mutation behind `ticket` showed early.
    pub fn roll_back(&mut self, ticket: &MutationTicket) -> Delivery {
        self.release(&ticket.target);
        let Some(view) = self.mutation_view_mut(ticket) else {
            return Delivery::Stale;
        };

        match &ticket.target {
            Target::Like(slug) => {
                let Some(entry) = view.entry_mut(slug) else {
                    return Delivery::Stale;
                };
                entry.delta = LikeDelta::None;
                entry.like = MutationState::RolledBack;
            }
            Target::Comment(id) => {
                let Some(thread) = view.thread.as_mut() else {
                    return Delivery::Stale;
                };
                thread.settle(id, MutationState::RolledBack);
            }
            Target::AddComment(_) => {}
        }

        Delivery::Applied
    }
}
