//! Runs the optimistic mutations of [`Views`] against the backend.
//!
//! The view state sits behind a plain mutex. It is locked for each `begin_*`
//! and `commit_*` step and never across a request, so a step observes and
//! leaves consistent state no matter how requests interleave.

use crate::client::{ApiClient, ClientError};
use quillboard_common::{
    model::{
        Id,
        auth::{Session, SessionError},
        comment::{Comment, CommentDraft, CommentEdit, CommentMarker},
        post::{Post, Slug},
    },
    state::{Delivery, Effect, MutationTicket, QueryKey, Rejection, ViewId, Views},
};
use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use thiserror::Error;
use time::UtcDateTime;
use tracing::{debug, info, warn};

pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Coarse classification of everything an operation can fail with.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ErrorKind {
    MalformedResponse,
    Unauthenticated,
    ValidationRejected,
    NetworkFailure,
    ServerRejected,
    Conflict,
    /// The client was set up wrong, e.g. with an unusable base URL.
    Configuration,
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("The request did not finish within {0:?}")]
    TimedOut(Duration),
}

impl MutationError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client(err) => match err {
                ClientError::Malformed(_) => ErrorKind::MalformedResponse,
                ClientError::Session(_) | ClientError::Unauthorized => ErrorKind::Unauthenticated,
                ClientError::Validation { .. } => ErrorKind::ValidationRejected,
                ClientError::Status { .. } => ErrorKind::ServerRejected,
                ClientError::Transport(_) => ErrorKind::NetworkFailure,
                ClientError::InvalidBaseUrl(_) => ErrorKind::Configuration,
            },
            Self::Rejected(Rejection::EmptyComment) => ErrorKind::ValidationRejected,
            Self::Rejected(_) => ErrorKind::Conflict,
            Self::Session(_) => ErrorKind::Unauthenticated,
            Self::TimedOut(_) => ErrorKind::NetworkFailure,
        }
    }
}

/// What became of a confirmed mutation.
#[must_use]
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Outcome<T> {
    /// The view now shows the server's answer.
    Committed(T),
    /// The server accepted the change, but the view that asked for it is
    /// gone or shows something else now.
    Discarded(T),
}

impl<T> Outcome<T> {
    fn new(delivery: Delivery, value: T) -> Self {
        match delivery {
            Delivery::Applied => Self::Committed(value),
            Delivery::Stale => Self::Discarded(value),
        }
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Committed(value) | Self::Discarded(value) => value,
        }
    }
}

pub struct Coordinator {
    client: ApiClient,
    views: Mutex<Views>,
    mutation_timeout: Duration,
}

impl Coordinator {
    #[must_use]
    pub fn new(client: ApiClient, mutation_timeout: Duration) -> Self {
        Self {
            client,
            views: Mutex::new(Views::new()),
            mutation_timeout,
        }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn views(&self) -> MutexGuard<'_, Views> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the current view state.
    pub fn with_views<R>(&self, f: impl FnOnce(&Views) -> R) -> R {
        f(&*self.views())
    }

    pub fn mount(&self, query: QueryKey) -> ViewId {
        self.views().mount(query)
    }

    /// Drops the view. Requests it started still run, but their results are
    /// thrown away.
    pub fn unmount(&self, view: ViewId) -> bool {
        self.views().unmount(view)
    }

    /// Fetches what `query` names into `view`. A fetch overtaken by a later
    /// one for the same view comes back as [`Delivery::Stale`].
    pub async fn load(&self, view: ViewId, query: QueryKey) -> Result<Delivery, MutationError> {
        let ticket = self.views().begin_fetch(view, query.clone())?;
        debug!(?view, ?query, "Fetching");

        let delivery = match &query {
            QueryKey::Feed(order) => {
                let mut posts = self.client.list_posts().await?;
                order.sort(&mut posts);
                self.views().complete_posts(&ticket, posts)
            }
            QueryKey::Tag(tag) => {
                let posts = self.client.list_posts_by_tag(tag).await?;
                self.views().complete_posts(&ticket, posts)
            }
            QueryKey::Post(slug) => {
                let post = self.client.fetch_post(slug).await?;
                self.views().complete_posts(&ticket, vec![post])
            }
            QueryKey::Comments(slug) => {
                let comments = self.client.list_comments(slug).await?;
                self.views().complete_comments(&ticket, comments)
            }
            QueryKey::LatestComments => {
                let comments = self.client.list_latest_comments().await?;
                self.views().complete_comments(&ticket, comments)
            }
        };

        Ok(delivery)
    }

    /// Loads the comments of `slug` alongside the post a detail view shows.
    pub async fn load_comments(&self, view: ViewId, slug: &Slug) -> Result<Delivery, MutationError> {
        let ticket = self
            .views()
            .current_ticket(view)
            .ok_or(Rejection::UnknownView(view))?;
        let comments = self.client.list_comments(slug).await?;
        Ok(self.views().complete_comments(&ticket, comments))
    }

    /// Replaces the server's comment counters of a list view with the
    /// lengths of the actual comment lists. A failed lookup keeps the
    /// counter it had.
    pub async fn refresh_comment_counts(&self, view: ViewId) -> Result<(), MutationError> {
        let (ticket, slugs) = {
            let views = self.views();
            let ticket = views
                .current_ticket(view)
                .ok_or(Rejection::UnknownView(view))?;
            let slugs: Vec<Slug> = views
                .posts(view)
                .unwrap_or_default()
                .iter()
                .map(|entry| entry.post.slug.clone())
                .collect();
            (ticket, slugs)
        };

        for slug in slugs {
            match self.client.list_comments(&slug).await {
                Ok(comments) => {
                    let count = comments.len() as u64;
                    if self.views().refine_comment_count(&ticket, &slug, count) == Delivery::Stale {
                        debug!(?view, "View moved on, stopping comment count refresh");
                        break;
                    }
                }
                Err(err) => warn!(%slug, error = %err, "Could not refresh comment count"),
            }
        }

        Ok(())
    }

    /// Bounds a mutation request by the configured timeout.
    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, MutationError> {
        match tokio::time::timeout(self.mutation_timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(MutationError::TimedOut(self.mutation_timeout)),
        }
    }

    /// Waits for the request of `effect`, then commits its answer or rolls
    /// the effect back.
    async fn settle<T: Clone>(
        &self,
        effect: Effect,
        request: impl Future<Output = Result<T, ClientError>>,
        commit: impl FnOnce(&mut Views, &MutationTicket, T) -> Delivery,
    ) -> Result<Outcome<T>, MutationError> {
        debug!(request = ?effect.request, "Issuing mutation");
        let result = self.bounded(request).await;

        let mut views = self.views();
        match result {
            Ok(value) => {
                let delivery = commit(&mut *views, &effect.ticket, value.clone());
                if delivery == Delivery::Stale {
                    info!(view = ?effect.ticket.view(), "Discarding mutation result for a view that moved on");
                }
                Ok(Outcome::new(delivery, value))
            }
            Err(err) => {
                warn!(mutation = ?effect.ticket.target(), error = %err, "Mutation failed, rolling back");
                let _ = views.roll_back(&effect.ticket);
                Err(err)
            }
        }
    }

    /// Toggles the session user's like on `slug` as shown in `view`.
    ///
    /// Returns `Ok(None)` without a request while an earlier toggle of the
    /// same post, from any view, is still pending.
    pub async fn toggle_like(
        &self,
        session: Option<&Session>,
        view: ViewId,
        slug: &Slug,
    ) -> Result<Option<Outcome<Post>>, MutationError> {
        let session = Session::require(session, UtcDateTime::now())?;
        let effect = self
            .views()
            .begin_toggle_like(view, slug, session.user_id())?;
        let Some(effect) = effect else {
            return Ok(None);
        };

        let request = self.client.like_post(Some(session), slug);
        self.settle(effect, request, Views::commit_like)
            .await
            .map(Some)
    }

    /// Posts a comment on `slug`, whose comments `view` shows. The comment
    /// appears once the server has stored it.
    pub async fn submit_comment(
        &self,
        session: Option<&Session>,
        view: ViewId,
        slug: &Slug,
        text: &str,
        anonymous: bool,
    ) -> Result<Outcome<Comment>, MutationError> {
        let session = Session::require(session, UtcDateTime::now())?;
        let draft = CommentDraft {
            text: text.to_owned(),
            anonymous,
        };
        let effect = self.views().begin_add_comment(view, slug, draft.clone())?;

        let request = self.client.add_comment(Some(session), slug, &draft);
        self.settle(effect, request, Views::commit_add_comment).await
    }

    pub async fn edit_comment(
        &self,
        session: Option<&Session>,
        view: ViewId,
        id: &Id<CommentMarker>,
        text: &str,
    ) -> Result<Outcome<Comment>, MutationError> {
        let session = Session::require(session, UtcDateTime::now())?;
        let edit = CommentEdit {
            text: text.to_owned(),
        };
        let effect = self
            .views()
            .begin_edit_comment(view, id, edit.text.clone(), session.user_id())?;

        let request = self.client.edit_comment(Some(session), id, &edit);
        self.settle(effect, request, Views::commit_edit_comment).await
    }

    pub async fn delete_comment(
        &self,
        session: Option<&Session>,
        view: ViewId,
        id: &Id<CommentMarker>,
    ) -> Result<Outcome<()>, MutationError> {
        let session = Session::require(session, UtcDateTime::now())?;
        let effect = self
            .views()
            .begin_delete_comment(view, id, session.user_id())?;

        let request = self.client.delete_comment(Some(session), id);
        self.settle(effect, request, |views, ticket, ()| {
            views.commit_delete_comment(ticket)
        })
        .await
    }
}
