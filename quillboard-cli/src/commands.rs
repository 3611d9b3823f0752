use clap::{Parser, Subcommand, ValueEnum};
use quillboard_client::{
    client::ClientError,
    coordinator::{Coordinator, MutationError, Outcome},
};
use quillboard_common::{
    model::{
        Id,
        auth::{AuthToken, Session},
        comment::{Comment, CommentMarker},
        post::{PostContent, Slug, SortOrder},
    },
    state::{PostEntry, QueryKey, ViewId},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{} ({:?})", .0, .0.kind())]
    Mutation(#[from] MutationError),
    #[error("Error reading {path}: {source}", path = .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a comment id: {0:?}")]
    InvalidId(String),
}

impl From<ClientError> for CommandError {
    fn from(value: ClientError) -> Self {
        Self::Mutation(value.into())
    }
}

#[derive(Parser)]
#[command(version, about = "Read and write posts on a Quillboard blog backend")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, ValueEnum)]
pub enum Sort {
    #[default]
    Latest,
    Popular,
}

impl From<Sort> for SortOrder {
    fn from(value: Sort) -> Self {
        match value {
            Sort::Latest => SortOrder::Latest,
            Sort::Popular => SortOrder::Popular,
        }
    }
}

#[derive(clap::Args)]
pub struct PostFields {
    title: String,
    description: String,
    /// Comma separated
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
    /// Image URL, may be repeated
    #[arg(long = "photo")]
    photos: Vec<String>,
    /// Save without publishing
    #[arg(long)]
    draft: bool,
}

impl From<PostFields> for PostContent {
    fn from(value: PostFields) -> Self {
        Self {
            title: value.title,
            description: value.description,
            tags: value.tags,
            photos: value.photos,
            is_published: Some(!value.draft),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List posts, newest or most liked first
    Posts {
        #[arg(long, value_enum, default_value_t)]
        sort: Sort,
        /// Only posts with this tag
        #[arg(long)]
        tag: Option<String>,
        /// Count the comment lists instead of trusting the server counters
        #[arg(long)]
        count_comments: bool,
    },
    /// Show a post with its comments
    Post { slug: Slug },
    Tags,
    Comments { slug: Slug },
    /// Most recent comments across all posts
    LatestComments,
    /// Like or unlike a post
    Like { slug: Slug },
    Comment {
        slug: Slug,
        text: String,
        #[arg(long)]
        anonymous: bool,
    },
    EditComment {
        slug: Slug,
        id: String,
        text: String,
    },
    DeleteComment { slug: Slug, id: String },
    /// Log in and print the session token
    Login { email: String, password: String },
    Register {
        fullname: String,
        email: String,
        password: String,
    },
    CreatePost(PostFields),
    UpdatePost {
        slug: Slug,
        #[command(flatten)]
        fields: PostFields,
    },
    DeletePost { slug: Slug },
    /// Upload an image and print its URL
    Upload { path: PathBuf },
}

impl Command {
    fn needs_session(&self) -> bool {
        matches!(
            self,
            Self::Like { .. }
                | Self::Comment { .. }
                | Self::EditComment { .. }
                | Self::DeleteComment { .. }
                | Self::CreatePost(_)
                | Self::UpdatePost { .. }
                | Self::DeletePost { .. }
                | Self::Upload { .. }
        )
    }
}

fn comment_id(id: String) -> Result<Id<CommentMarker>, CommandError> {
    Id::new(id.clone()).ok_or(CommandError::InvalidId(id))
}

fn image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn print_post(entry: &PostEntry, comments: Option<u64>) {
    let post = &entry.post;
    println!(
        "{}  {}  [likes {}, comments {}, views {}]",
        post.slug,
        post.title,
        entry.like_count(),
        comments.unwrap_or(post.comment_count),
        post.views,
    );
}

fn print_comment(comment: &Comment) {
    let by = comment.byline.display_name().unwrap_or("anonymous");
    println!("{}  {by}: {}", comment.id, comment.text);
}

fn print_thread(coordinator: &Coordinator, view: ViewId) {
    coordinator.with_views(|views| {
        for comment in views.comments(view).unwrap_or_default() {
            print_comment(comment);
        }
    });
}

/// Mounts a view for `query` and fills it.
async fn open(coordinator: &Coordinator, query: QueryKey) -> Result<ViewId, CommandError> {
    let view = coordinator.mount(query.clone());
    let _ = coordinator.load(view, query).await?;
    Ok(view)
}

pub async fn run(
    coordinator: &Coordinator,
    token: Option<AuthToken>,
    command: Command,
) -> Result<(), CommandError> {
    let client = coordinator.client();
    let session: Option<Session> = match token {
        Some(token) if command.needs_session() => Some(client.resume(token).await?),
        _ => None,
    };
    let session = session.as_ref();

    match command {
        Command::Posts {
            sort,
            tag,
            count_comments,
        } => {
            let query = match tag {
                Some(tag) => QueryKey::Tag(tag),
                None => QueryKey::Feed(sort.into()),
            };
            let view = open(coordinator, query).await?;
            if count_comments {
                coordinator.refresh_comment_counts(view).await?;
            }
            coordinator.with_views(|views| {
                for entry in views.posts(view).unwrap_or_default() {
                    print_post(entry, views.comment_count(view, &entry.post.slug));
                }
            });
        }
        Command::Post { slug } => {
            let view = open(coordinator, QueryKey::Post(slug.clone())).await?;
            let _ = coordinator.load_comments(view, &slug).await?;
            coordinator.with_views(|views| {
                if let Some(entry) = views.post(view, &slug) {
                    print_post(entry, views.comment_count(view, &slug));
                    println!("{}", entry.post.description);
                    if !entry.post.tags.is_empty() {
                        println!("tags: {}", entry.post.tags.join(", "));
                    }
                }
            });
            print_thread(coordinator, view);
        }
        Command::Tags => {
            for tag in client.list_tags().await? {
                match tag.count {
                    Some(count) => println!("{} ({count})", tag.name),
                    None => println!("{}", tag.name),
                }
            }
        }
        Command::Comments { slug } => {
            let view = open(coordinator, QueryKey::Comments(slug)).await?;
            print_thread(coordinator, view);
        }
        Command::LatestComments => {
            let view = open(coordinator, QueryKey::LatestComments).await?;
            print_thread(coordinator, view);
        }
        Command::Like { slug } => {
            let view = open(coordinator, QueryKey::Post(slug.clone())).await?;
            match coordinator.toggle_like(session, view, &slug).await? {
                Some(Outcome::Committed(post) | Outcome::Discarded(post)) => {
                    let liked = session.is_some_and(|session| post.likes.contains(session.user_id()));
                    println!("{} now has {} likes", post.slug, post.likes_count());
                    info!(%slug, liked, "Toggled like");
                }
                None => println!("A like for {slug} is already in flight"),
            }
        }
        Command::Comment {
            slug,
            text,
            anonymous,
        } => {
            let view = open(coordinator, QueryKey::Comments(slug.clone())).await?;
            let comment = coordinator
                .submit_comment(session, view, &slug, &text, anonymous)
                .await?
                .into_inner();
            print_comment(&comment);
            if let Some(count) = coordinator.with_views(|views| views.comment_count(view, &slug)) {
                println!("{slug} has {count} comments");
            }
        }
        Command::EditComment { slug, id, text } => {
            let view = open(coordinator, QueryKey::Comments(slug)).await?;
            let comment = coordinator
                .edit_comment(session, view, &comment_id(id)?, &text)
                .await?
                .into_inner();
            print_comment(&comment);
        }
        Command::DeleteComment { slug, id } => {
            let id = comment_id(id)?;
            let view = open(coordinator, QueryKey::Comments(slug)).await?;
            coordinator
                .delete_comment(session, view, &id)
                .await?
                .into_inner();
            println!("Deleted comment {id}");
        }
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            info!(user = %session.user_id(), "Logged in");
            println!("{}", session.token.as_str());
        }
        Command::Register {
            fullname,
            email,
            password,
        } => {
            let session = client.register(&fullname, &email, &password).await?;
            info!(user = %session.user_id(), "Registered");
            println!("{}", session.token.as_str());
        }
        Command::CreatePost(fields) => {
            let post = client.create_post(session, &fields.into()).await?;
            println!("Created {}", post.slug);
        }
        Command::UpdatePost { slug, fields } => {
            let post = client.update_post(session, &slug, &fields.into()).await?;
            println!("Updated {}", post.slug);
        }
        Command::DeletePost { slug } => {
            client.delete_post(session, &slug).await?;
            println!("Deleted {slug}");
        }
        Command::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| CommandError::Read {
                    path: path.clone(),
                    source,
                })?;
            let name = path
                .file_name()
                .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
            let url = client
                .upload_image(session, &name, bytes, image_mime(&path))
                .await?;
            println!("{url}");
        }
    }

    Ok(())
}
