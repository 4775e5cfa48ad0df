use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const GROUP_SLUG_MAX_LEN: usize = 20;
pub const GROUP_TITLE_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: Option<String>,
    pub slug: GroupSlug,
    pub description: String,
}

/// The part of a group embedded in every post that belongs to it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct GroupSummary {
    pub id: Id<GroupMarker>,
    pub title: Option<String>,
    pub slug: GroupSlug,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateGroup {
    pub title: Option<String>,
    pub slug: GroupSlug,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group slug is invalid: {0}")]
pub struct InvalidGroupSlugError(String);

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';

        if (1..=GROUP_SLUG_MAX_LEN).contains(&slug.len()) && slug.chars().all(allowed) {
            Ok(GroupSlug(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GroupSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupSlug::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"GroupSlug"))
    }
}

impl From<Group> for GroupSummary {
    fn from(value: Group) -> Self {
        Self {
            id: value.id,
            title: value.title,
            slug: value.slug,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::group::GroupSlug;

    #[test]
    fn slug_validation() {
        for legal in ["test-slug", "slugforgroup", "Rtest-slug2", "a_b"] {
            assert!(GroupSlug::new(legal.to_owned()).is_ok(), "{legal}");
        }
        for illegal in ["", "has space", "ümlaut", "twenty-one-characters"] {
            assert!(GroupSlug::new(illegal.to_owned()).is_err(), "{illegal}");
        }
    }
}
