use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use quillboard_client::{
    client::ApiClient,
    coordinator::{Coordinator, ErrorKind, MutationError, Outcome},
};
use quillboard_common::{
    model::{
        Id,
        auth::{AuthToken, Session},
        post::{Slug, SortOrder},
        user::User,
    },
    state::{MutationState, QueryKey},
};
use serde_json::{Value, json};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{net::TcpListener, sync::Notify};

const TOKEN: &str = "token-u1";

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum LikeReply {
    Confirm,
    Fail,
    /// Waits for `Backend::release` before confirming.
    Held,
    Never,
}

#[derive(Clone)]
struct Backend {
    like_reply: LikeReply,
    like_requests: Arc<AtomicUsize>,
    comment_requests: Arc<AtomicUsize>,
    release: Arc<Notify>,
}

impl Backend {
    fn new(like_reply: LikeReply) -> Self {
        Self {
            like_reply,
            like_requests: Arc::new(AtomicUsize::new(0)),
            comment_requests: Arc::new(AtomicUsize::new(0)),
            release: Arc::new(Notify::new()),
        }
    }
}

fn raw_post(slug: &str, likes: &[&str], created_at: &str) -> Value {
    json!({
        "_id": format!("id-{slug}"),
        "slug": slug,
        "title": format!("Post {slug}"),
        "description": "body",
        "tags": ["rust", "web"],
        "likes": likes,
        "commentsCount": 9,
        "author": { "_id": "u2", "fullname": "Someone Else" },
        "createdAt": created_at,
    })
}

fn raw_comment(id: &str, text: &str, created_at: &str) -> Value {
    json!({
        "_id": id,
        "text": text,
        "post": "id-a",
        "author": { "_id": "u1", "fullname": "Test User" },
        "createdAt": created_at,
    })
}

fn check_token(auth: Option<TypedHeader<Authorization<Bearer>>>) -> Result<(), (StatusCode, Json<Value>)> {
    match auth {
        Some(TypedHeader(Authorization(bearer))) if bearer.token() == TOKEN => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Not authorized" })),
        )),
    }
}

async fn list_posts() -> Json<Value> {
    Json(json!([
        raw_post("c", &[], "2025-01-01T10:00:00.000Z"),
        { "_id": "id-b", "title": "No slug" },
        raw_post("a", &[], "2025-01-02T10:00:00.000Z"),
    ]))
}

async fn get_post(Path(slug): Path<String>) -> Json<Value> {
    Json(raw_post(&slug, &[], "2025-01-02T10:00:00.000Z"))
}

async fn like(
    State(backend): State<Backend>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(slug): Path<String>,
) -> Reply {
    check_token(auth)?;
    backend.like_requests.fetch_add(1, Ordering::SeqCst);

    match backend.like_reply {
        LikeReply::Confirm => {}
        LikeReply::Held => backend.release.notified().await,
        LikeReply::Never => std::future::pending().await,
        LikeReply::Fail => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "database unavailable" })),
            ));
        }
    }

    Ok(Json(raw_post(&slug, &["u1"], "2025-01-02T10:00:00.000Z")))
}

async fn list_comments() -> Json<Value> {
    Json(json!([
        raw_comment("c4", "fourth", "2025-01-04T10:00:00Z"),
        raw_comment("c3", "third", "2025-01-03T10:00:00Z"),
        raw_comment("c2", "second", "2025-01-02T10:00:00Z"),
        raw_comment("c1", "first", "2025-01-01T10:00:00Z"),
    ]))
}

async fn add_comment(
    State(backend): State<Backend>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(body): Json<Value>,
) -> Reply {
    check_token(auth)?;
    backend.comment_requests.fetch_add(1, Ordering::SeqCst);

    let text = body["text"].as_str().unwrap_or_default();
    if text == "reject" {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Validation failed", "errors": { "text": "too rude" } })),
        ));
    }
    Ok(Json(raw_comment("c5", text, "2025-01-05T10:00:00Z")))
}

async fn edit_comment(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    check_token(auth)?;
    let text = body["text"].as_str().unwrap_or_default();
    Ok(Json(raw_comment(&id, text, "2025-01-02T10:00:00Z")))
}

async fn delete_comment(auth: Option<TypedHeader<Authorization<Bearer>>>) -> Reply {
    check_token(auth)?;
    Ok(Json(json!({ "message": "Comment deleted" })))
}

async fn serve(backend: Backend) -> String {
    let app = Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{slug}", get(get_post))
        .route("/posts/{slug}/like", post(like))
        .route("/posts/{slug}/comments", get(list_comments).post(add_comment))
        .route("/comments/{id}", patch(edit_comment).delete(delete_comment))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    format!("http://{addr}")
}

async fn setup(like_reply: LikeReply, mutation_timeout: Duration) -> (Coordinator, Backend) {
    let backend = Backend::new(like_reply);
    let base_url = serve(backend.clone()).await;
    let client = ApiClient::new(&base_url, Some(Duration::from_secs(5))).unwrap();
    (Coordinator::new(client, mutation_timeout), backend)
}

fn session() -> Session {
    let user = User {
        id: Id::new("u1").unwrap(),
        fullname: "Test User".to_owned(),
        email: Some("test@example.com".to_owned()),
        avatar: None,
        created_at: None,
    };
    Session::new(AuthToken::new(TOKEN), user)
}

fn slug(slug: &str) -> Slug {
    Slug::new(slug).unwrap()
}

#[tokio::test]
async fn feed_skips_malformed_posts_and_sorts() {
    let (coordinator, _) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let query = QueryKey::Feed(SortOrder::Latest);
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let slugs: Vec<String> = coordinator.with_views(|views| {
        views
            .posts(view)
            .unwrap()
            .iter()
            .map(|entry| entry.post.slug.get().to_owned())
            .collect()
    });
    assert_eq!(slugs, ["a", "c"]);
}

#[tokio::test]
async fn like_commits_server_post() {
    let (coordinator, backend) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Feed(SortOrder::Latest);
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let outcome = coordinator
        .toggle_like(Some(&session), view, &slug("a"))
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_committed());
    assert_eq!(outcome.into_inner().like_count, 1);
    assert_eq!(backend.like_requests.load(Ordering::SeqCst), 1);

    coordinator.with_views(|views| {
        let entry = views.post(view, &slug("a")).unwrap();
        assert_eq!(entry.like, MutationState::Committed);
        assert_eq!(entry.like_count(), 1);
        assert!(entry.liked_by(session.user_id()));
    });
}

#[tokio::test]
async fn failed_like_rolls_back() {
    let (coordinator, backend) = setup(LikeReply::Fail, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let err = coordinator
        .toggle_like(Some(&session), view, &slug("a"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerRejected);
    assert_eq!(backend.like_requests.load(Ordering::SeqCst), 1);

    coordinator.with_views(|views| {
        let entry = views.post(view, &slug("a")).unwrap();
        assert_eq!(entry.like, MutationState::RolledBack);
        assert_eq!(entry.like_count(), 0);
        assert!(!entry.liked_by(session.user_id()));
    });
}

#[tokio::test]
async fn second_toggle_while_pending_sends_nothing() {
    let (coordinator, backend) = setup(LikeReply::Held, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();
    let a = slug("a");

    let (first, second) = tokio::join!(
        coordinator.toggle_like(Some(&session), view, &a),
        async {
            let second = coordinator.toggle_like(Some(&session), view, &a).await;
            coordinator.with_views(|views| {
                assert_eq!(views.post(view, &a).unwrap().like_count(), 1);
            });
            backend.release.notify_one();
            second
        },
    );

    assert!(second.unwrap().is_none());
    assert!(first.unwrap().unwrap().is_committed());
    assert_eq!(backend.like_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn toggle_without_session_sends_nothing() {
    let (coordinator, backend) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let err = coordinator.toggle_like(None, view, &slug("a")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert_eq!(backend.like_requests.load(Ordering::SeqCst), 0);
    coordinator.with_views(|views| {
        assert_eq!(views.post(view, &slug("a")).unwrap().like, MutationState::Idle);
    });
}

#[tokio::test]
async fn result_for_unmounted_view_is_discarded() {
    let (coordinator, backend) = setup(LikeReply::Held, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();
    let a = slug("a");

    let (outcome, ()) = tokio::join!(
        coordinator.toggle_like(Some(&session), view, &a),
        async {
            assert!(coordinator.unmount(view));
            backend.release.notify_one();
        },
    );

    let outcome = outcome.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Discarded(_)));
    assert!(coordinator.with_views(|views| views.posts(view).is_none()));
}

#[tokio::test]
async fn hung_like_times_out_and_rolls_back() {
    let (coordinator, _) = setup(LikeReply::Never, Duration::from_millis(200)).await;
    let session = session();
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let err = coordinator
        .toggle_like(Some(&session), view, &slug("a"))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::TimedOut(_)));
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);

    coordinator.with_views(|views| {
        let entry = views.post(view, &slug("a")).unwrap();
        assert_eq!(entry.like, MutationState::RolledBack);
        assert_eq!(entry.like_count(), 0);
    });
}

#[tokio::test]
async fn added_comment_lands_on_top() {
    let (coordinator, backend) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Post(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();
    let _ = coordinator.load_comments(view, &slug("a")).await.unwrap();
    assert_eq!(
        coordinator.with_views(|views| views.comment_count(view, &slug("a"))),
        Some(4)
    );

    let outcome = coordinator
        .submit_comment(Some(&session), view, &slug("a"), "hello", false)
        .await
        .unwrap();
    assert!(outcome.is_committed());
    assert_eq!(backend.comment_requests.load(Ordering::SeqCst), 1);

    coordinator.with_views(|views| {
        assert_eq!(views.comment_count(view, &slug("a")), Some(5));
        let comments = views.comments(view).unwrap();
        assert_eq!(comments[0].id.get(), "c5");
        assert_eq!(comments[0].text, "hello");
    });
}

#[tokio::test]
async fn rejected_comment_reports_fields() {
    let (coordinator, _) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Comments(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let err = coordinator
        .submit_comment(Some(&session), view, &slug("a"), "reject", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationRejected);
    match err {
        MutationError::Client(quillboard_client::client::ClientError::Validation {
            message,
            fields,
        }) => {
            assert_eq!(message, "Validation failed");
            assert_eq!(fields.get("text").map(String::as_str), Some("too rude"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        coordinator.with_views(|views| views.comments(view).map(<[_]>::len)),
        Some(4)
    );
}

#[tokio::test]
async fn blank_comment_is_rejected_locally() {
    let (coordinator, backend) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Comments(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let err = coordinator
        .submit_comment(Some(&session), view, &slug("a"), "   ", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationRejected);
    assert_eq!(backend.comment_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn edit_and_delete_comment() {
    let (coordinator, _) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let session = session();
    let query = QueryKey::Comments(slug("a"));
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();

    let c2 = Id::new("c2").unwrap();
    let edited = coordinator
        .edit_comment(Some(&session), view, &c2, "second, revised")
        .await
        .unwrap();
    assert!(edited.is_committed());
    coordinator.with_views(|views| {
        let comments = views.comments(view).unwrap();
        assert_eq!(comments[2].id, c2);
        assert_eq!(comments[2].text, "second, revised");
    });

    let deleted = coordinator.delete_comment(Some(&session), view, &c2).await.unwrap();
    assert!(deleted.is_committed());
    coordinator.with_views(|views| {
        assert_eq!(views.comment_count(view, &slug("a")), Some(3));
        assert!(views.comments(view).unwrap().iter().all(|c| c.id != c2));
    });
}

#[tokio::test]
async fn comment_counts_are_refreshed_from_lists() {
    let (coordinator, _) = setup(LikeReply::Confirm, Duration::from_secs(5)).await;
    let query = QueryKey::Feed(SortOrder::Popular);
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await.unwrap();
    assert_eq!(
        coordinator.with_views(|views| views.comment_count(view, &slug("c"))),
        Some(9)
    );

    coordinator.refresh_comment_counts(view).await.unwrap();
    coordinator.with_views(|views| {
        assert_eq!(views.comment_count(view, &slug("a")), Some(4));
        assert_eq!(views.comment_count(view, &slug("c")), Some(4));
    });
}
