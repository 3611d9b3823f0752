use crate::{
    model::{Id, post::Post, post::Slug, user::UserMarker},
    reconcile::{self, LikeDelta},
    state::{
        Delivery, Effect, MutationState, MutationTicket, Rejection, Request, Target, ViewId, Views,
    },
};
use tracing::debug;

impl Views {
    /// Shows the toggle immediately and asks for the like request.
    ///
    /// Returns `Ok(None)` without touching anything while an earlier toggle
    /// of the same post is still pending, in this view or any other.
    pub fn begin_toggle_like(
        &mut self,
        view: ViewId,
        slug: &Slug,
        viewer: &Id<UserMarker>,
    ) -> Result<Option<Effect>, Rejection> {
        let ticket = self.ticket(view, Target::Like(slug.clone()))?;
        let entry = self
            .views
            .get_mut(&view)
            .and_then(|view| view.entry_mut(slug))
            .ok_or_else(|| Rejection::UnknownPost(slug.clone()))?;

        if self.likes_in_flight.contains(slug) {
            debug!(%slug, "Ignoring like toggle while another one is pending");
            return Ok(None);
        }

        entry.delta = LikeDelta::toggle_from(reconcile::has_user_liked(&entry.post, viewer));
        entry.like = MutationState::Pending;
        self.likes_in_flight.insert(slug.clone());

        Ok(Some(Effect {
            ticket,
            request: Request::ToggleLike { slug: slug.clone() },
        }))
    }

    /// Replaces the post with the server's version and clears the local delta.
    /// Comment counts are left alone.
    pub fn commit_like(&mut self, ticket: &MutationTicket, post: Post) -> Delivery {
        let Target::Like(slug) = &ticket.target else {
            return Delivery::Stale;
        };
        self.likes_in_flight.remove(slug);
        let Some(entry) = self
            .mutation_view_mut(ticket)
            .and_then(|view| view.entry_mut(slug))
        else {
            return Delivery::Stale;
        };

        entry.replace_post(post.clone());
        entry.delta = LikeDelta::None;
        entry.like = MutationState::Committed;

        for (id, other) in &mut self.views {
            if *id == ticket.view {
                continue;
            }
            if let Some(entry) = other.entry_mut(slug) {
                entry.replace_post(post.clone());
            }
        }

        Delivery::Applied
    }
}
