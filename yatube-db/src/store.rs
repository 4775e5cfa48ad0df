//! One repository trait per entity. [`Store`] bundles them for the server,
//! which holds it as `Arc<dyn Store>` so that the PostgreSQL client and the
//! in-memory store are interchangeable.

use crate::Result;
use async_trait::async_trait;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, Post, PostContent, PostMarker},
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    pagination::{Page, PageRequest, Paginator},
};

/// Which posts a listing contains. Every listing is ordered newest first, with
/// the higher id first among posts created at the same instant.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    /// Also deletes the user's posts, comments, follows and tokens.
    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    /// All groups, ordered by slug.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    /// Posts of the group stay, without a group.
    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        paginator: Paginator,
        request: PageRequest,
    ) -> Result<Page<Post>>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    /// Replaces the editable fields, keeping author and creation time.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    /// Also deletes the post's comments.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of a post, oldest first.
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;
}

#[async_trait]
pub trait FollowRepository: Send + Sync {
    async fn fetch_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>>;

    /// Every follow edge starting at `user`.
    async fn fetch_follows(&self, user: Id<UserMarker>) -> Result<Vec<Follow>>;

    /// Returns `None` without touching anything if the edge already exists.
    async fn create_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>>;

    async fn delete_follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;
}

pub trait Store:
    UserRepository
    + GroupRepository
    + PostRepository
    + CommentRepository
    + FollowRepository
    + AuthRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + GroupRepository
        + PostRepository
        + CommentRepository
        + FollowRepository
        + AuthRepository
{
}
