pub mod auth;
pub mod comment;
pub mod post;
pub mod user;

use crate::model::post::InvalidSlugError;
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

/// A backend payload that could not be turned into a canonical entity.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum MalformedResponse {
    #[error("Required field `{0}` was missing or empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Slug(#[from] InvalidSlugError),
    #[error("Field `{field}` is not a valid RFC 3339 timestamp: {value}")]
    Timestamp { field: &'static str, value: String },
    #[error("Payload did not have the expected shape: {0}")]
    Shape(String),
}

impl From<serde_json::Error> for MalformedResponse {
    fn from(value: serde_json::Error) -> Self {
        Self::Shape(value.to_string())
    }
}

/// Opaque backend identifier, typed by the entity it names.
#[derive_where(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(String, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    /// Returns `None` for an empty or blank identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.trim().is_empty()).then_some(Self(id, PhantomData))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> AsRef<str> for Id<Marker> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
