use crate::{
    Result,
    record::{
        AuthenticationRecord, CommentRecord, FollowRecord, FullPostRecord, GroupRecord, UserRecord,
    },
    store::{
        AuthRepository, CommentRepository, FollowRepository, GroupRepository, PostFilter,
        PostRepository, UserRepository,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use time::PrimitiveDateTime;
use tracing::info;
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

macro_rules! select_posts {
    ($($tail:tt)*) => {
        concat!(
            "
            SELECT
                posts.post_id,
                posts.text,
                posts.created_at,
                posts.image,
                users.user_id,
                users.handle,
                post_groups.group_id,
                post_groups.title AS group_title,
                post_groups.slug AS group_slug
            FROM
                posts
                JOIN users ON users.user_id = posts.author_id
                LEFT JOIN post_groups ON post_groups.group_id = posts.group_id
            ",
            $($tail)*
        )
    };
}

/// Binds `$1` (group), `$2` (author) and `$3` (follower); a `NULL` disables
/// the corresponding condition.
macro_rules! post_filter {
    () => {
        "
        WHERE
            ($1::BIGINT IS NULL OR posts.group_id = $1)
            AND ($2::BIGINT IS NULL OR posts.author_id = $2)
            AND (
                $3::BIGINT IS NULL
                OR posts.author_id IN (
                    SELECT follows.author_id FROM follows WHERE follows.user_id = $3
                )
            )
        "
    };
}

macro_rules! select_comments {
    ($($tail:tt)*) => {
        concat!(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created_at,
                users.user_id,
                users.handle
            FROM
                comments
                JOIN users ON users.user_id = comments.author_id
            ",
            $($tail)*
        )
    };
}

impl PostFilter {
    fn binds(self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match self {
            PostFilter::All => (None, None, None),
            PostFilter::Group(group_id) => (Some(group_id.get().cast_signed()), None, None),
            PostFilter::Author(user_id) => (None, Some(user_id.get().cast_signed()), None),
            PostFilter::FollowedBy(user_id) => (None, None, Some(user_id.get().cast_signed())),
        }
    }
}

fn db_id<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

/// [`Store`](crate::store::Store) backed by PostgreSQL. Cascades and
/// `SET NULL` on group deletion are foreign key rules in the migrations.
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for DbClient {
    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT users.user_id, users.handle
            FROM users
            WHERE users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users (handle)
            VALUES ($1)
            RETURNING user_id, handle
            ",
        )
        .bind(user.handle.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users WHERE user_id = $1")
            .bind(db_id(user_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GroupRepository for DbClient {
    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            WHERE group_id = $1
            ",
        )
        .bind(db_id(group_id))
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            ORDER BY slug
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO post_groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING group_id, title, slug, description
            ",
        )
        .bind(group.title.as_deref())
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let result = query("DELETE FROM post_groups WHERE group_id = $1")
            .bind(db_id(group_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostRepository for DbClient {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(select_posts!("WHERE posts.post_id = $1"))
            .bind(db_id(post_id))
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        paginator: Paginator,
        request: PageRequest,
    ) -> Result<Page<Post>> {
        let count = self.count_posts(filter).await?;
        let window = paginator.window(count, request);
        let (group, author, follower) = filter.binds();

        let records = query_as::<_, FullPostRecord>(select_posts!(
            post_filter!(),
            "
            ORDER BY posts.created_at DESC, posts.post_id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(group)
        .bind(author)
        .bind(follower)
        .bind(window.limit().cast_signed())
        .bind(window.offset().cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(window, posts))
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let (group, author, follower) = filter.binds();

        let count: i64 = query_scalar(concat!("SELECT COUNT(*) FROM posts ", post_filter!()))
            .bind(group)
            .bind(author)
            .bind(follower)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id
            ",
        )
        .bind(&post.content.text)
        .bind(db_id(post.author))
        .bind(post.content.group.map(db_id))
        .bind(post.content.image.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let post = self
            .fetch_post(post_id.cast_unsigned().into())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let updated = query(
            "
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE post_id = $1
            ",
        )
        .bind(db_id(post_id))
        .bind(&content.text)
        .bind(content.group.map(db_id))
        .bind(content.image.as_deref())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(post_id).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = $1")
            .bind(db_id(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentRepository for DbClient {
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(select_comments!(
            "
            WHERE comments.post_id = $1
            ORDER BY comments.created_at, comments.comment_id
            "
        ))
        .bind(db_id(post_id))
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id: i64 = query_scalar(
            "
            INSERT INTO comments (post_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING comment_id
            ",
        )
        .bind(db_id(comment.post))
        .bind(db_id(comment.author))
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await?;

        let record =
            query_as::<_, CommentRecord>(select_comments!("WHERE comments.comment_id = $1"))
                .bind(comment_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(record.try_into()?)
    }
}

#[async_trait]
impl FollowRepository for DbClient {
    async fn fetch_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>> {
        let record = query_as::<_, FollowRecord>(
            "
            SELECT follow_id, user_id, author_id
            FROM follows
            WHERE user_id = $1 AND author_id = $2
            ",
        )
        .bind(db_id(user))
        .bind(db_id(author))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Follow::from))
    }

    async fn fetch_follows(&self, user: Id<UserMarker>) -> Result<Vec<Follow>> {
        let records = query_as::<_, FollowRecord>(
            "
            SELECT follow_id, user_id, author_id
            FROM follows
            WHERE user_id = $1
            ORDER BY follow_id
            ",
        )
        .bind(db_id(user))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Follow::from).collect())
    }

    async fn create_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<Option<Follow>> {
        let record = query_as::<_, FollowRecord>(
            "
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT unique_pair DO NOTHING
            RETURNING follow_id, user_id, author_id
            ",
        )
        .bind(db_id(user))
        .bind(db_id(author))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Follow::from))
    }

    async fn delete_follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(db_id(user))
            .bind(db_id(author))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuthRepository for DbClient {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM auth_tokens
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let created_at = PrimitiveDateTime::new(
            authentication.created_at.date(),
            authentication.created_at.time(),
        );

        query(
            "
            INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(db_id(authentication.user))
        .bind(created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// These run against the database named by `DATABASE_URL` and are skipped
/// without it. Every row they create carries a fresh handle, so a shared
/// database is fine; listings are only checked through per-user filters.
#[cfg(test)]
mod tests {
    use crate::{
        client::DbClient,
        store::{
            AuthRepository, CommentRepository, FollowRepository, PostFilter, PostRepository,
            UserRepository,
        },
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use time::{Duration, OffsetDateTime, UtcDateTime};
    use yatube_common::{
        model::{
            Id,
            auth::AuthToken,
            comment::CreateComment,
            post::{CreatePost, Post, PostContent},
            user::{CreateUser, User, UserHandle, UserMarker},
        },
        pagination::{PageRequest, Paginator},
        util::PositiveDuration,
    };

    async fn connect() -> Option<DbClient> {
        let database_url = std::env::var("DATABASE_URL").ok()?;
        let db = DbClient::connect(&database_url, 2).await.unwrap();
        db.migrate().await.unwrap();
        Some(db)
    }

    async fn user(db: &DbClient, name: &str) -> User {
        static SEQUENCE: AtomicU32 = AtomicU32::new(0);
        let handle = format!(
            "{name}-{}-{}",
            OffsetDateTime::now_utc().unix_timestamp_nanos(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );

        let handle = UserHandle::new(handle).unwrap();
        db.create_user(&CreateUser { handle }).await.unwrap()
    }

    async fn post(db: &DbClient, author: Id<UserMarker>, text: &str) -> Post {
        let post = CreatePost {
            author,
            content: PostContent {
                text: text.to_owned(),
                group: None,
                image: None,
            },
        };
        db.create_post(&post).await.unwrap()
    }

    async fn texts(db: &DbClient, filter: PostFilter) -> Vec<String> {
        db.fetch_posts(filter, Paginator::default(), PageRequest::first())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|post| post.text)
            .collect()
    }

    #[tokio::test]
    async fn follow_feed_and_idempotent_follow() {
        let Some(db) = connect().await else {
            return;
        };
        let viewer = user(&db, "viewer").await;
        let author = user(&db, "author").await;
        let stranger = user(&db, "stranger").await;

        post(&db, author.id, "older").await;
        post(&db, author.id, "newer").await;
        post(&db, stranger.id, "not followed").await;
        assert!(texts(&db, PostFilter::FollowedBy(viewer.id)).await.is_empty());

        let follow = db.create_follow(viewer.id, author.id).await.unwrap();
        assert!(follow.is_some());
        assert!(db.create_follow(viewer.id, author.id).await.unwrap().is_none());
        assert_eq!(db.fetch_follows(viewer.id).await.unwrap(), [follow.unwrap()]);

        assert_eq!(
            texts(&db, PostFilter::FollowedBy(viewer.id)).await,
            ["newer", "older"]
        );
        assert_eq!(db.count_posts(PostFilter::FollowedBy(viewer.id)).await.unwrap(), 2);

        assert!(db.delete_follow(viewer.id, author.id).await.unwrap());
        assert!(!db.delete_follow(viewer.id, author.id).await.unwrap());
        assert!(db.fetch_follow(viewer.id, author.id).await.unwrap().is_none());
        assert!(texts(&db, PostFilter::FollowedBy(viewer.id)).await.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let Some(db) = connect().await else {
            return;
        };
        let author = user(&db, "author").await;
        let reader = user(&db, "reader").await;

        let authored = post(&db, author.id, "by author").await;
        let other = post(&db, reader.id, "by reader").await;
        let comment = |post, author| CreateComment {
            post,
            author,
            text: "comment".to_owned(),
        };
        db.create_comment(&comment(authored.id, reader.id)).await.unwrap();
        db.create_comment(&comment(other.id, author.id)).await.unwrap();
        db.create_follow(reader.id, author.id).await.unwrap();
        let token = AuthToken::generate_random(author.id);
        let authentication = token.authentication(None).unwrap();
        db.create_auth(&authentication).await.unwrap();

        assert!(db.delete_user(author.id).await.unwrap());
        assert!(!db.delete_user(author.id).await.unwrap());

        assert!(db.fetch_post(authored.id).await.unwrap().is_none());
        assert!(db.fetch_comments(other.id).await.unwrap().is_empty());
        assert!(db.fetch_follows(reader.id).await.unwrap().is_empty());
        assert!(db.fetch_auth(&authentication.token_hash).await.unwrap().is_none());
        assert!(db.fetch_user_by_handle(&author.handle).await.unwrap().is_none());
        assert_eq!(texts(&db, PostFilter::Author(reader.id)).await, ["by reader"]);
    }

    #[tokio::test]
    async fn stored_tokens_keep_their_lifetime() {
        let Some(db) = connect().await else {
            return;
        };
        let owner = user(&db, "owner").await;
        let lifetime = PositiveDuration::new(Duration::days(3));

        let token = AuthToken::generate_random(owner.id);
        db.create_auth(&token.authentication(lifetime).unwrap())
            .await
            .unwrap();

        let stored = db.fetch_auth(&token.hash().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.user, owner.id);
        assert_eq!(stored.expires_after, lifetime);
        assert!(!stored.is_expired_at(UtcDateTime::now()));
    }
}
