pub mod auth;
pub mod comment;
pub mod follow;
pub mod form;
pub mod group;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError, group::InvalidGroupSlugError,
        user::InvalidUserHandleError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    GroupSlug(#[from] InvalidGroupSlugError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

/// Store-assigned identifier of an entity, tagged with the entity's marker type
/// so that a post id can never be passed where a user id is expected.
///
/// Ids grow in insertion order, which is what breaks ties between posts that
/// share a creation timestamp.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn id_is_transparent_in_json() {
        let id: Id<PostMarker> = 61.into();
        assert_eq!(serde_json::to_string(&id).unwrap(), "61");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("61").unwrap(), id);
        assert_eq!(id.to_string(), "61");
    }
}
