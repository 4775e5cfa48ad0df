use crate::model::{
    Id,
    form::{FormErrors, require_text},
    group::{GroupMarker, GroupSummary},
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const POST_IMAGE_MAX_LEN: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: User,
    pub group: Option<GroupSummary>,
    pub image: Option<String>,
}

/// The user-editable part of a post, after validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
}

/// A post submission as sent by the client. Missing fields are treated as
/// empty so that they show up as field errors instead of a rejected body.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

impl PostForm {
    pub const TEXT: &'static str = "text";
    pub const GROUP: &'static str = "group";
    pub const IMAGE: &'static str = "image";

    /// Field checks that need no store access. Whether `group` refers to an
    /// existing group is left to the caller.
    #[must_use]
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        require_text(&mut errors, Self::TEXT, &self.text);

        if let Some(image) = &self.image
            && image.chars().count() > POST_IMAGE_MAX_LEN
        {
            errors.add(
                Self::IMAGE,
                format!("Ensure this value has at most {POST_IMAGE_MAX_LEN} characters."),
            );
        }

        errors
    }

    #[must_use]
    pub fn into_content(self) -> PostContent {
        PostContent {
            text: self.text.trim().to_owned(),
            group: self.group,
            image: self.image.filter(|image| !image.trim().is_empty()),
        }
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group.as_ref().map(|group| group.id),
            image: post.image.clone(),
        }
    }
}
