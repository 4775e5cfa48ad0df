use crate::model::{
    Id,
    form::{FormErrors, require_text},
    post::PostMarker,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: User,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub const TEXT: &'static str = "text";

    #[must_use]
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        require_text(&mut errors, Self::TEXT, &self.text);
        errors
    }

    #[must_use]
    pub fn into_create(self, post: Id<PostMarker>, author: Id<UserMarker>) -> CreateComment {
        CreateComment {
            post,
            author,
            text: self.text.trim().to_owned(),
        }
    }
}
