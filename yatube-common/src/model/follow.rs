use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FollowMarker;

/// `user` sees the posts of `author` in their follow feed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Follow {
    pub id: Id<FollowMarker>,
    pub user: Id<UserMarker>,
    pub author: Id<UserMarker>,
}
