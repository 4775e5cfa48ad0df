//! A [`Store`](crate::store::Store) that keeps everything in process memory.
//!
//! Used when no database is configured and by tests. It enforces the same
//! unique constraints, foreign keys, cascades and `SET NULL` rules as the
//! PostgreSQL schema, in application code.

use crate::{
    DbError, Result,
    store::{
        AuthRepository, CommentRepository, FollowRepository, GroupRepository, PostFilter,
        PostRepository, UserRepository,
    },
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug, GroupSummary},
        post::{CreatePost, Post, PostContent, PostMarker},
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    pagination::{Page, PageRequest, Paginator},
};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
struct Sequence(u64);

impl Sequence {
    fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Clone, Debug)]
struct PostRow {
    text: String,
    created_at: OffsetDateTime,
    author: u64,
    group: Option<u64>,
    image: Option<String>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    post: u64,
    author: u64,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    user_ids: Sequence,
    group_ids: Sequence,
    post_ids: Sequence,
    comment_ids: Sequence,
    follow_ids: Sequence,
    users: BTreeMap<u64, UserHandle>,
    groups: BTreeMap<u64, Group>,
    posts: BTreeMap<u64, PostRow>,
    comments: BTreeMap<u64, CommentRow>,
    /// `(user, author)` to follow id.
    follows: BTreeMap<(u64, u64), u64>,
    auths: HashMap<AuthTokenHash, Authentication>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tables {
    fn user(&self, user_id: u64) -> Result<User> {
        let handle = self
            .users
            .get(&user_id)
            .ok_or_else(|| DbError::MissingReference("users_pkey".to_owned()))?;

        Ok(User {
            id: user_id.into(),
            handle: handle.clone(),
        })
    }

    fn require_user(&self, user_id: u64, constraint: &str) -> Result<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(DbError::MissingReference(constraint.to_owned()))
        }
    }

    fn require_group(&self, group_id: Option<u64>) -> Result<()> {
        match group_id {
            Some(group_id) if !self.groups.contains_key(&group_id) => Err(
                DbError::MissingReference("posts_group_id_fkey".to_owned()),
            ),
            _ => Ok(()),
        }
    }

    fn full_post(&self, post_id: u64, row: &PostRow) -> Result<Post> {
        let group = row
            .group
            .and_then(|group_id| self.groups.get(&group_id))
            .cloned()
            .map(GroupSummary::from);

        Ok(Post {
            id: post_id.into(),
            text: row.text.clone(),
            created_at: row.created_at,
            author: self.user(row.author)?,
            group,
            image: row.image.clone(),
        })
    }

    fn full_comment(&self, comment_id: u64, row: &CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: comment_id.into(),
            post: row.post.into(),
            author: self.user(row.author)?,
            text: row.text.clone(),
            created_at: row.created_at,
        })
    }

    /// Matching posts, newest first.
    fn filtered_posts(&self, filter: PostFilter) -> Vec<(u64, &PostRow)> {
        let followed: BTreeSet<u64> = match filter {
            PostFilter::FollowedBy(user_id) => self
                .follows
                .keys()
                .filter(|(user, _)| *user == user_id.get())
                .map(|(_, author)| *author)
                .collect(),
            _ => BTreeSet::new(),
        };

        let mut posts: Vec<(u64, &PostRow)> = self
            .posts
            .iter()
            .map(|(post_id, row)| (*post_id, row))
            .filter(|(_, row)| match filter {
                PostFilter::All => true,
                PostFilter::Group(group_id) => row.group == Some(group_id.get()),
                PostFilter::Author(user_id) => row.author == user_id.get(),
                PostFilter::FollowedBy(_) => followed.contains(&row.author),
            })
            .collect();

        posts.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at.cmp(&a.created_at).then(b_id.cmp(a_id))
        });
        posts
    }

    fn remove_post(&mut self, post_id: u64) -> bool {
        let removed = self.posts.remove(&post_id).is_some();
        self.comments.retain(|_, comment| comment.post != post_id);
        removed
    }
}

fn follow(user: u64, author: u64, follow_id: u64) -> Follow {
    Follow {
        id: follow_id.into(),
        user: user.into(),
        author: author.into(),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let tables = self.tables();
        let user = tables
            .users
            .iter()
            .find(|(_, existing)| *existing == handle)
            .map(|(user_id, handle)| User {
                id: (*user_id).into(),
                handle: handle.clone(),
            });

        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables();
        if tables.users.values().any(|handle| *handle == user.handle) {
            return Err(DbError::UniqueViolation("users_handle_key".to_owned()));
        }

        let user_id = tables.user_ids.next();
        tables.users.insert(user_id, user.handle.clone());

        Ok(User {
            id: user_id.into(),
            handle: user.handle.clone(),
        })
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let user_id = user_id.get();
        let mut tables = self.tables();
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let authored: Vec<u64> = tables
            .posts
            .iter()
            .filter(|(_, post)| post.author == user_id)
            .map(|(post_id, _)| *post_id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }

        tables.comments.retain(|_, comment| comment.author != user_id);
        tables
            .follows
            .retain(|(user, author), _| *user != user_id && *author != user_id);
        tables.auths.retain(|_, auth| auth.user.get() != user_id);

        Ok(true)
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.tables().groups.get(&group_id.get()).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let tables = self.tables();
        let group = tables.groups.values().find(|group| group.slug == *slug);
        Ok(group.cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.tables().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(groups)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut tables = self.tables();
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::UniqueViolation("post_groups_slug_key".to_owned()));
        }

        let group = Group {
            id: tables.group_ids.next().into(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(group.id.get(), group.clone());

        Ok(group)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let group_id = group_id.get();
        let mut tables = self.tables();
        if tables.groups.remove(&group_id).is_none() {
            return Ok(false);
        }

        for post in tables.posts.values_mut() {
            if post.group == Some(group_id) {
                post.group = None;
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();
        tables
            .posts
            .get(&post_id.get())
            .map(|row| tables.full_post(post_id.get(), row))
            .transpose()
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        paginator: Paginator,
        request: PageRequest,
    ) -> Result<Page<Post>> {
        let tables = self.tables();
        let posts = tables.filtered_posts(filter);

        paginator
            .paginate(posts, request)
            .try_map(|(post_id, row)| tables.full_post(post_id, row))
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        Ok(self.tables().filtered_posts(filter).len() as u64)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tables = self.tables();
        tables.require_user(post.author.get(), "posts_author_id_fkey")?;
        let group = post.content.group.map(Id::get);
        tables.require_group(group)?;

        let post_id = tables.post_ids.next();
        let row = PostRow {
            text: post.content.text.clone(),
            created_at: OffsetDateTime::now_utc(),
            author: post.author.get(),
            group,
            image: post.content.image.clone(),
        };
        let post = tables.full_post(post_id, &row)?;
        tables.posts.insert(post_id, row);

        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();
        let group = content.group.map(Id::get);
        tables.require_group(group)?;

        let Some(row) = tables.posts.get_mut(&post_id.get()) else {
            return Ok(None);
        };
        row.text.clone_from(&content.text);
        row.group = group;
        row.image.clone_from(&content.image);

        let row = row.clone();
        tables.full_post(post_id.get(), &row).map(Some)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self.tables().remove_post(post_id.get()))
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables();
        let mut comments: Vec<(u64, &CommentRow)> = tables
            .comments
            .iter()
            .filter(|(_, comment)| comment.post == post_id.get())
            .map(|(comment_id, comment)| (*comment_id, comment))
            .collect();
        comments.sort_by(|(a_id, a), (b_id, b)| {
            a.created_at.cmp(&b.created_at).then(a_id.cmp(b_id))
        });

        comments
            .into_iter()
            .map(|(comment_id, row)| tables.full_comment(comment_id, row))
            .collect()
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut tables = self.tables();
        if !tables.posts.contains_key(&comment.post.get()) {
            return Err(DbError::MissingReference(
                "comments_post_id_fkey".to_owned(),
            ));
        }
        tables.require_user(comment.author.get(), "comments_author_id_fkey")?;

        let comment_id = tables.comment_ids.next();
        let row = CommentRow {
            post: comment.post.get(),
            author: comment.author.get(),
            text: comment.text.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        let comment = tables.full_comment(comment_id, &row)?;
        tables.comments.insert(comment_id, row);

        Ok(comment)
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn fetch_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>> {
        let key = (user.get(), author.get());
        let follow_id = self.tables().follows.get(&key).copied();
        Ok(follow_id.map(|follow_id| follow(key.0, key.1, follow_id)))
    }

    async fn fetch_follows(&self, user: Id<UserMarker>) -> Result<Vec<Follow>> {
        let tables = self.tables();
        let mut follows: Vec<Follow> = tables
            .follows
            .iter()
            .filter(|((follower, _), _)| *follower == user.get())
            .map(|((follower, author), follow_id)| follow(*follower, *author, *follow_id))
            .collect();
        follows.sort_by_key(|edge| edge.id);
        Ok(follows)
    }

    async fn create_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>> {
        let key = (user.get(), author.get());
        let mut tables = self.tables();
        tables.require_user(key.0, "follows_user_id_fkey")?;
        tables.require_user(key.1, "follows_author_id_fkey")?;
        if tables.follows.contains_key(&key) {
            return Ok(None);
        }

        let follow_id = tables.follow_ids.next();
        tables.follows.insert(key, follow_id);
        Ok(Some(follow(key.0, key.1, follow_id)))
    }

    async fn delete_follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let key = (user.get(), author.get());
        Ok(self.tables().follows.remove(&key).is_some())
    }
}

#[async_trait]
impl AuthRepository for MemoryStore {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self.tables().auths.get(token_hash).cloned())
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables();
        tables.require_user(authentication.user.get(), "auth_tokens_user_id_fkey")?;
        if tables.auths.contains_key(&authentication.token_hash) {
            return Err(DbError::UniqueViolation("auth_tokens_pkey".to_owned()));
        }

        tables
            .auths
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }
}
