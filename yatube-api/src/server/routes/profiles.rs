use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::Json,
    routes::PageQuery,
};
use axum::{Router, extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use yatube_common::{
    model::{
        post::Post,
        user::{User, UserHandle},
    },
    pagination::{Page, Paginator},
};
use yatube_db::store::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(profile)
        .typed_post(profile_follow)
        .typed_post(profile_unfollow)
        .typed_get(follow_index)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{handle}/", rejection(ServerError))]
pub struct ProfilePath {
    pub handle: UserHandle,
}

#[derive(Serialize)]
struct Profile {
    author: User,
    post_count: u64,
    /// Whether the viewer follows the author, absent for anonymous viewers.
    following: Option<bool>,
    page: Page<Post>,
}

async fn find_author(store: &dyn Store, handle: UserHandle) -> Result<User> {
    store
        .fetch_user_by_handle(&handle)
        .await?
        .ok_or(ServerError::UserByHandleNotFound(handle))
}

async fn profile(
    ProfilePath { handle }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    viewer: Option<AuthenticatedUser>,
    query: PageQuery,
) -> Result<Json<Profile>> {
    let author = find_author(&*store, handle).await?;

    let page = store
        .fetch_posts(
            PostFilter::Author(author.id),
            Paginator::default(),
            query.request(),
        )
        .await?;

    let following = match viewer {
        Some(viewer) => Some(
            store
                .fetch_follow(viewer.user_id(), author.id)
                .await?
                .is_some(),
        ),
        None => None,
    };

    Ok(Json(Profile {
        author,
        post_count: page.count,
        following,
        page,
    }))
}

fn redirect_to_profile(handle: UserHandle) -> Redirect {
    Redirect::to(&ProfilePath { handle }.to_string())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{handle}/follow/", rejection(ServerError))]
struct ProfileFollowPath {
    handle: UserHandle,
}

/// Following oneself or someone already followed changes nothing.
async fn profile_follow(
    ProfileFollowPath { handle }: ProfileFollowPath,
    State(store): State<Arc<dyn Store>>,
    viewer: AuthenticatedUser,
) -> Result<Redirect> {
    let author = find_author(&*store, handle).await?;

    if author.id == viewer.user_id() {
        debug!(user = %author.id, "Ignoring self-follow");
    } else if let Some(follow) = store.create_follow(viewer.user_id(), author.id).await? {
        info!(follow = %follow.id, user = %follow.user, author = %follow.author, "Followed author");
    } else {
        debug!(user = %viewer.user_id(), author = %author.id, "Already following");
    }

    Ok(redirect_to_profile(author.handle))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{handle}/unfollow/", rejection(ServerError))]
struct ProfileUnfollowPath {
    handle: UserHandle,
}

async fn profile_unfollow(
    ProfileUnfollowPath { handle }: ProfileUnfollowPath,
    State(store): State<Arc<dyn Store>>,
    viewer: AuthenticatedUser,
) -> Result<Redirect> {
    let author = find_author(&*store, handle).await?;

    if store.delete_follow(viewer.user_id(), author.id).await? {
        info!(user = %viewer.user_id(), author = %author.id, "Unfollowed author");
    }

    Ok(redirect_to_profile(author.handle))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowIndexPath();

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(store): State<Arc<dyn Store>>,
    viewer: AuthenticatedUser,
    query: PageQuery,
) -> Result<Json<Page<Post>>> {
    let page = store
        .fetch_posts(
            PostFilter::FollowedBy(viewer.user_id()),
            Paginator::default(),
            query.request(),
        )
        .await?;

    Ok(Json(page))
}
