use crate::model::{Id, user::User, user::UserMarker};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken(String);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum SessionError {
    #[error("No session is available, log in first")]
    Missing,
    #[error("The session expired at {0}")]
    Expired(UtcDateTime),
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the `exp` claim if the token is a JWT. Opaque tokens have no
    /// client-side expiry.
    #[must_use]
    pub fn expiry(&self) -> Option<UtcDateTime> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;

        UtcDateTime::from_unix_timestamp(claims.exp?).ok()
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"[redacted]").finish()
    }
}

/// Signed-in state handed to every mutation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub token: AuthToken,
    pub expires_at: Option<UtcDateTime>,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn new(token: AuthToken, user: User) -> Self {
        Self {
            expires_at: token.expiry(),
            token,
            user,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &Id<UserMarker> {
        &self.user.id
    }

    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns the session if one exists and is still valid at `now`.
    pub fn require(session: Option<&Session>, now: UtcDateTime) -> Result<&Session, SessionError> {
        let session = session.ok_or(SessionError::Missing)?;

        match session.expires_at {
            Some(expires_at) if session.is_expired_at(now) => Err(SessionError::Expired(expires_at)),
            _ => Ok(session),
        }
    }
}
