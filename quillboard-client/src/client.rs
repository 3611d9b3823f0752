use crate::record::{
    ErrorDetails, SessionRecord, UploadRecord, adapt_comment, adapt_comments, adapt_post,
    adapt_posts, adapt_tags, adapt_user, into_items,
};
use quillboard_common::model::{
    Id, MalformedResponse,
    auth::{AuthToken, Session, SessionError},
    comment::{self, Comment, CommentDraft, CommentEdit, CommentMarker},
    post::{Post, PostContent, Slug, Tag},
    user::User,
};
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, Url,
    multipart::{Form, Part},
};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use time::UtcDateTime;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:4444";

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("The API base URL cannot carry paths: {0}")]
    InvalidBaseUrl(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("The server did not accept the session")]
    Unauthorized,
    #[error("The server rejected the request: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },
    #[error("The server answered {status}: {message}")]
    Status { status: StatusCode, message: String },
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    fullname: &'a str,
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| ClientError::InvalidBaseUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.into()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.endpoint(segments)?))
    }

    fn authorized(
        &self,
        method: Method,
        segments: &[&str],
        session: Option<&Session>,
    ) -> Result<RequestBuilder> {
        let session = Session::require(session, UtcDateTime::now())?;
        Ok(self
            .request(method, segments)?
            .bearer_auth(session.token.as_str()))
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "Received response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let details = ErrorDetails::parse(&body);
        let message = details
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned());
        warn!(%status, %message, "Request rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                message,
                fields: details.fields,
            },
            status => ClientError::Status { status, message },
        })
    }

    async fn json(request: RequestBuilder) -> Result<Value> {
        let body = Self::send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body).map_err(MalformedResponse::from)?)
    }

    async fn session(request: RequestBuilder) -> Result<Session> {
        let record: SessionRecord =
            serde_json::from_value(Self::json(request).await?).map_err(MalformedResponse::from)?;
        let (token, user) = record.into_parts()?;
        Ok(Session::new(AuthToken::new(token), user))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, &["auth", "login"])?
            .json(&Credentials { email, password });
        Self::session(request).await
    }

    pub async fn register(&self, fullname: &str, email: &str, password: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, &["auth", "register"])?
            .json(&Registration {
                fullname,
                email,
                password,
            });
        Self::session(request).await
    }

    /// Turns a stored token back into a session.
    pub async fn resume(&self, token: AuthToken) -> Result<Session> {
        let request = self
            .request(Method::GET, &["auth", "me"])?
            .bearer_auth(token.as_str());
        let user: User = adapt_user(Self::json(request).await?)?;
        Ok(Session::new(token, user))
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let value = Self::json(self.request(Method::GET, &["posts"])?).await?;
        Ok(adapt_posts(into_items(value)?))
    }

    pub async fn list_posts_by_tag(&self, tag: &str) -> Result<Vec<Post>> {
        let value = Self::json(self.request(Method::GET, &["posts", "tag", tag])?).await?;
        Ok(adapt_posts(into_items(value)?))
    }

    pub async fn fetch_post(&self, slug: &Slug) -> Result<Post> {
        let value = Self::json(self.request(Method::GET, &["posts", slug.get()])?).await?;
        Ok(adapt_post(value)?)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let value = Self::json(self.request(Method::GET, &["tags"])?).await?;
        Ok(adapt_tags(into_items(value)?))
    }

    pub async fn create_post(&self, session: Option<&Session>, content: &PostContent) -> Result<Post> {
        let request = self
            .authorized(Method::POST, &["posts"], session)?
            .json(content);
        Ok(adapt_post(Self::json(request).await?)?)
    }

    pub async fn update_post(
        &self,
        session: Option<&Session>,
        slug: &Slug,
        content: &PostContent,
    ) -> Result<Post> {
        let request = self
            .authorized(Method::PATCH, &["posts", slug.get()], session)?
            .json(content);
        Ok(adapt_post(Self::json(request).await?)?)
    }

    pub async fn delete_post(&self, session: Option<&Session>, slug: &Slug) -> Result<()> {
        let request = self.authorized(Method::DELETE, &["posts", slug.get()], session)?;
        Self::send(request).await?;
        Ok(())
    }

    /// Toggles the session user's like and returns the post as the server
    /// now sees it.
    pub async fn like_post(&self, session: Option<&Session>, slug: &Slug) -> Result<Post> {
        let request = self.authorized(Method::POST, &["posts", slug.get(), "like"], session)?;
        Ok(adapt_post(Self::json(request).await?)?)
    }

    pub async fn list_comments(&self, slug: &Slug) -> Result<Vec<Comment>> {
        let value =
            Self::json(self.request(Method::GET, &["posts", slug.get(), "comments"])?).await?;
        Ok(adapt_comments(into_items(value)?))
    }

    /// Most recent comments across all posts, newest first.
    pub async fn list_latest_comments(&self) -> Result<Vec<Comment>> {
        let value = Self::json(self.request(Method::GET, &["comments"])?).await?;
        let mut comments = adapt_comments(into_items(value)?);
        comment::sort_newest_first(&mut comments);
        Ok(comments)
    }

    pub async fn add_comment(
        &self,
        session: Option<&Session>,
        slug: &Slug,
        draft: &CommentDraft,
    ) -> Result<Comment> {
        let request = self
            .authorized(Method::POST, &["posts", slug.get(), "comments"], session)?
            .json(draft);
        let mut comment = adapt_comment(Self::json(request).await?)?;
        comment.post.get_or_insert_with(|| slug.get().to_owned());
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        session: Option<&Session>,
        id: &Id<CommentMarker>,
        edit: &CommentEdit,
    ) -> Result<Comment> {
        let request = self
            .authorized(Method::PATCH, &["comments", id.get()], session)?
            .json(edit);
        Ok(adapt_comment(Self::json(request).await?)?)
    }

    pub async fn delete_comment(&self, session: Option<&Session>, id: &Id<CommentMarker>) -> Result<()> {
        let request = self.authorized(Method::DELETE, &["comments", id.get()], session)?;
        Self::send(request).await?;
        Ok(())
    }

    /// Uploads an image and returns the URL the backend serves it under.
    pub async fn upload_image(
        &self,
        session: Option<&Session>,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str(mime)?;
        let request = self
            .authorized(Method::POST, &["upload"], session)?
            .multipart(Form::new().part("image", part));

        let record: UploadRecord =
            serde_json::from_value(Self::json(request).await?).map_err(MalformedResponse::from)?;
        Ok(record.url)
    }
}
