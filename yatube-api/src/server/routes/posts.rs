use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::Json,
    routes::{PageQuery, profiles::ProfilePath},
};
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{
        Id,
        comment::{Comment, CommentForm},
        form::INVALID_CHOICE,
        group::GroupSummary,
        post::{CreatePost, Post, PostContent, PostForm, PostMarker},
    },
    pagination::{Page, Paginator},
};
use yatube_db::store::{PostFilter, Store};

/// The home page. Mounted separately so that only it sits behind the page cache.
pub fn index_routes() -> ServerRouter {
    Router::new().typed_get(index)
}

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(post_detail)
        .typed_get(create_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_post(delete_post)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
pub struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    State(store): State<Arc<dyn Store>>,
    query: PageQuery,
) -> Result<Json<Page<Post>>> {
    let page = store
        .fetch_posts(PostFilter::All, Paginator::default(), query.request())
        .await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
pub struct PostDetailPath {
    pub id: Id<PostMarker>,
}

#[derive(Serialize)]
struct PostDetail {
    post: Post,
    author_post_count: u64,
    comments: Vec<Comment>,
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostDetail>> {
    let post = find_post(&*store, id).await?;
    let author_post_count = store
        .count_posts(PostFilter::Author(post.author.id))
        .await?;
    let comments = store.fetch_comments(id).await?;

    Ok(Json(PostDetail {
        post,
        author_post_count,
        comments,
    }))
}

async fn find_post(store: &dyn Store, id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

/// What an author fills in, with the groups a post may be filed under.
#[derive(Serialize)]
struct PostFormPage {
    form: PostForm,
    groups: Vec<GroupSummary>,
    is_edit: bool,
}

impl PostFormPage {
    async fn new(store: &dyn Store, form: PostForm, is_edit: bool) -> Result<Self> {
        let groups = store
            .list_groups()
            .await?
            .into_iter()
            .map(GroupSummary::from)
            .collect();

        Ok(Self {
            form,
            groups,
            is_edit,
        })
    }
}

async fn validate_post_form(store: &dyn Store, form: PostForm) -> Result<PostContent> {
    let mut errors = form.errors();

    if let Some(group) = form.group
        && store.fetch_group(group).await?.is_none()
    {
        errors.add(PostForm::GROUP, INVALID_CHOICE);
    }

    if errors.is_empty() {
        Ok(form.into_content())
    } else {
        Err(ServerError::invalid_form(&form, errors))
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
struct CreatePostPath();

async fn create_post_form(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Json<PostFormPage>> {
    Ok(Json(
        PostFormPage::new(&*store, PostForm::default(), false).await?,
    ))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Redirect> {
    let content = validate_post_form(&*store, form).await?;
    let post = store
        .create_post(&CreatePost {
            author: user.user_id(),
            content,
        })
        .await?;

    info!(post = %post.id, author = %post.author.handle, "Created post");

    Ok(Redirect::to(&IndexPath().to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = find_post(&*store, id).await?;
    if post.author.id != user.user_id() {
        return Ok(redirect_to_post(id).into_response());
    }

    let page = PostFormPage::new(&*store, PostForm::from(&post), true).await?;
    Ok(Json(page).into_response())
}

async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Redirect> {
    let post = find_post(&*store, id).await?;
    if post.author.id != user.user_id() {
        info!(post = %id, user = %user.user_id(), "Refused edit by someone other than the author");
        return Ok(redirect_to_post(id));
    }

    let content = validate_post_form(&*store, form).await?;
    store
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    info!(post = %id, "Edited post");

    Ok(redirect_to_post(id))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/delete/", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let post = find_post(&*store, id).await?;
    if post.author.id != user.user_id() {
        info!(post = %id, user = %user.user_id(), "Refused deletion by someone other than the author");
        return Ok(redirect_to_post(id));
    }

    store.delete_post(id).await?;

    info!(post = %id, "Deleted post");

    let profile = ProfilePath {
        handle: post.author.handle,
    };
    Ok(Redirect::to(&profile.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Redirect> {
    find_post(&*store, id).await?;

    let errors = form.errors();
    if !errors.is_empty() {
        return Err(ServerError::invalid_form(&form, errors));
    }

    let comment = store
        .create_comment(&form.into_create(id, user.user_id()))
        .await?;

    info!(comment = %comment.id, post = %id, "Added comment");

    Ok(redirect_to_post(id))
}

fn redirect_to_post(id: Id<PostMarker>) -> Redirect {
    Redirect::to(&PostDetailPath { id }.to_string())
}
