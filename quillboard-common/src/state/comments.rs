use crate::{
    model::{
        Id,
        comment::{Comment, CommentDraft, CommentEdit, CommentMarker},
        post::Slug,
        user::UserMarker,
    },
    reconcile,
    state::{
        Delivery, Effect, FetchTicket, MutationState, MutationTicket, QueryKey, Rejection, Request,
        Target, ViewId, Views,
    },
};
use std::collections::HashMap;

/// A fetched comment list, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CommentThread {
    /// `None` for lists that span several posts.
    pub slug: Option<Slug>,
    pub comments: Vec<Comment>,
    states: HashMap<Id<CommentMarker>, MutationState>,
}

impl CommentThread {
    #[must_use]
    pub fn state(&self, id: &Id<CommentMarker>) -> MutationState {
        self.states.get(id).copied().unwrap_or_default()
    }

    pub(super) fn settle(&mut self, id: &Id<CommentMarker>, state: MutationState) {
        if let Some(current) = self.states.get_mut(id) {
            *current = state;
        }
    }

    fn position(&self, id: &Id<CommentMarker>) -> Option<usize> {
        self.comments.iter().position(|comment| comment.id == *id)
    }

    fn remove(&mut self, id: &Id<CommentMarker>) -> Option<Comment> {
        self.states.remove(id);
        let index = self.position(id)?;
        Some(self.comments.remove(index))
    }

    fn count(&self) -> u64 {
        self.comments.len() as u64
    }
}

impl Views {
    #[must_use]
    pub fn thread(&self, view: ViewId) -> Option<&CommentThread> {
        self.views.get(&view)?.thread.as_ref()
    }

    /// Stores a fetched comment list. Edits and deletes still in flight keep
    /// their pending state.
    pub fn complete_comments(&mut self, ticket: &FetchTicket, comments: Vec<Comment>) -> Delivery {
        let Some(view) = self.current_view_mut(ticket) else {
            return Delivery::Stale;
        };

        let slug = match &view.query {
            QueryKey::Comments(slug) | QueryKey::Post(slug) => Some(slug.clone()),
            QueryKey::Feed(_) | QueryKey::Tag(_) | QueryKey::LatestComments => None,
        };
        let states = view
            .thread
            .take()
            .map(|thread| thread.states)
            .unwrap_or_default()
            .into_iter()
            .filter(|(id, state)| {
                *state == MutationState::Pending && comments.iter().any(|c| c.id == *id)
            })
            .collect();

        let thread = CommentThread {
            slug,
            comments,
            states,
        };
        let count = thread.count();
        let slug = thread.slug.clone();
        view.thread = Some(thread);

        if let Some(slug) = slug {
            self.propagate_comment_count(&slug, count);
        }
        Delivery::Applied
    }

    /// Validates a new comment on `slug`, which must be the post whose
    /// comments the view shows. Nothing is shown until the server answers.
    pub fn begin_add_comment(
        &mut self,
        view: ViewId,
        slug: &Slug,
        draft: CommentDraft,
    ) -> Result<Effect, Rejection> {
        if self.thread(view).and_then(|thread| thread.slug.as_ref()) != Some(slug) {
            return Err(Rejection::NoCommentList);
        }
        if draft.text.trim().is_empty() {
            return Err(Rejection::EmptyComment);
        }

        Ok(Effect {
            ticket: self.ticket(view, Target::AddComment(slug.clone()))?,
            request: Request::AddComment {
                slug: slug.clone(),
                draft,
            },
        })
    }

    /// Prepends the server's comment to every thread of the post. A refetch
    /// that already brought the comment along does not duplicate it.
    pub fn commit_add_comment(&mut self, ticket: &MutationTicket, comment: Comment) -> Delivery {
        let Target::AddComment(slug) = &ticket.target else {
            return Delivery::Stale;
        };
        if self
            .mutation_view_mut(ticket)
            .and_then(|view| view.thread.as_mut())
            .is_none()
        {
            return Delivery::Stale;
        }

        let mut count = 0;
        for (id, view) in &mut self.views {
            let Some(thread) = view
                .thread
                .as_mut()
                .filter(|thread| thread.slug.as_ref() == Some(slug))
            else {
                continue;
            };
            thread.remove(&comment.id);
            thread.comments.insert(0, comment.clone());
            if *id == ticket.view {
                count = thread.count();
            }
        }

        self.propagate_comment_count(slug, count);
        Delivery::Applied
    }

    pub fn begin_edit_comment(
        &mut self,
        view: ViewId,
        id: &Id<CommentMarker>,
        text: String,
        viewer: &Id<UserMarker>,
    ) -> Result<Effect, Rejection> {
        if text.trim().is_empty() {
            return Err(Rejection::EmptyComment);
        }
        self.gate_comment(view, id, viewer)?;

        Ok(Effect {
            ticket: self.ticket(view, Target::Comment(id.clone()))?,
            request: Request::EditComment {
                id: id.clone(),
                edit: CommentEdit { text },
            },
        })
    }

    /// Replaces the comment in place, keeping its position, in every thread
    /// that shows it.
    pub fn commit_edit_comment(&mut self, ticket: &MutationTicket, comment: Comment) -> Delivery {
        let Target::Comment(id) = &ticket.target else {
            return Delivery::Stale;
        };
        self.comments_in_flight.remove(id);
        let Some(thread) = self
            .mutation_view_mut(ticket)
            .and_then(|view| view.thread.as_mut())
        else {
            return Delivery::Stale;
        };
        thread.settle(id, MutationState::Committed);
        if thread.position(id).is_none() {
            return Delivery::Stale;
        }

        for thread in self.views.values_mut().filter_map(|view| view.thread.as_mut()) {
            if let Some(index) = thread.position(id) {
                thread.comments[index] = comment.clone();
            }
        }
        Delivery::Applied
    }

    /// Validates a delete. The comment stays visible until the server agrees.
    pub fn begin_delete_comment(
        &mut self,
        view: ViewId,
        id: &Id<CommentMarker>,
        viewer: &Id<UserMarker>,
    ) -> Result<Effect, Rejection> {
        self.gate_comment(view, id, viewer)?;

        Ok(Effect {
            ticket: self.ticket(view, Target::Comment(id.clone()))?,
            request: Request::DeleteComment { id: id.clone() },
        })
    }

    pub fn commit_delete_comment(&mut self, ticket: &MutationTicket) -> Delivery {
        let Target::Comment(id) = &ticket.target else {
            return Delivery::Stale;
        };
        self.comments_in_flight.remove(id);
        let Some(thread) = self
            .mutation_view_mut(ticket)
            .and_then(|view| view.thread.as_mut())
        else {
            return Delivery::Stale;
        };
        let Some(removed) = thread.remove(id) else {
            return Delivery::Stale;
        };

        // A thread spanning several posts only knows the post through the
        // comment's own reference.
        let slug = thread.slug.clone().or_else(|| {
            removed
                .post
                .as_deref()
                .and_then(|reference| self.resolve_post(reference))
        });
        for thread in self.views.values_mut().filter_map(|view| view.thread.as_mut()) {
            thread.remove(id);
        }

        if let Some(slug) = slug {
            self.recount_comments(&slug);
        }
        Delivery::Applied
    }

    /// Checks ownership and marks the comment pending.
    fn gate_comment(
        &mut self,
        view: ViewId,
        id: &Id<CommentMarker>,
        viewer: &Id<UserMarker>,
    ) -> Result<(), Rejection> {
        let thread = self
            .views
            .get_mut(&view)
            .ok_or(Rejection::UnknownView(view))?
            .thread
            .as_mut()
            .ok_or(Rejection::NoCommentList)?;
        let comment = thread
            .position(id)
            .map(|index| &thread.comments[index])
            .ok_or_else(|| Rejection::UnknownComment(id.clone()))?;

        if comment.byline.is_anonymous() {
            return Err(Rejection::Anonymous(id.clone()));
        }
        if !reconcile::can_modify_comment(Some(viewer), comment) {
            return Err(Rejection::NotAuthor(id.clone()));
        }
        if self.comments_in_flight.contains(id) {
            return Err(Rejection::Busy(id.clone()));
        }

        thread.states.insert(id.clone(), MutationState::Pending);
        self.comments_in_flight.insert(id.clone());
        Ok(())
    }
}
