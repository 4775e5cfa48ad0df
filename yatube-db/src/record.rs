use sqlx::FromRow;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use yatube_common::model::{
    ModelValidationError,
    auth::Authentication,
    comment::Comment,
    follow::Follow,
    group::{Group, GroupSlug, GroupSummary},
    post::Post,
    user::{User, UserHandle},
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_id: i64,
    pub title: Option<String>,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub image: Option<String>,
    pub user_id: i64,
    pub handle: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FollowRecord {
    pub follow_id: i64,
    pub user_id: i64,
    pub author_id: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn user(user_id: i64, handle: String) -> Result<User, ModelValidationError> {
    Ok(User {
        id: user_id.cast_unsigned().into(),
        handle: UserHandle::new(handle)?,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        user(value.user_id, value.handle)
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.group_id.cast_unsigned().into(),
            title: value.title,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (value.group_id, value.group_slug) {
            (Some(group_id), Some(slug)) => Some(GroupSummary {
                id: group_id.cast_unsigned().into(),
                title: value.group_title,
                slug: GroupSlug::new(slug)?,
            }),
            _ => None,
        };

        Ok(Self {
            id: value.post_id.cast_unsigned().into(),
            text: value.text,
            created_at: value.created_at,
            author: user(value.user_id, value.handle)?,
            group,
            image: value.image,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.cast_unsigned().into(),
            post: value.post_id.cast_unsigned().into(),
            author: user(value.user_id, value.handle)?,
            text: value.text,
            created_at: value.created_at,
        })
    }
}

impl From<FollowRecord> for Follow {
    fn from(value: FollowRecord) -> Self {
        Self {
            id: value.follow_id.cast_unsigned().into(),
            user: value.user_id.cast_unsigned().into(),
            author: value.author_id.cast_unsigned().into(),
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.cast_unsigned().into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
