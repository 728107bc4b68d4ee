use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Value;

pub type Row = Vec<Value>;

/// Primary key of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Uuid(Uuid),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{}", id),
            Self::Uuid(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

/// Identity of a row: its concrete entity type plus primary key.
///
/// Two keys are equal when both parts are equal, which is the only notion of
/// entity equality the cascade pipeline relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity: String,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Namespace part of the entity type name (`blog::Post` -> `blog`).
    pub fn namespace(&self) -> Option<&str> {
        namespace_of(&self.entity)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

pub fn namespace_of(type_name: &str) -> Option<&str> {
    let trimmed = type_name.trim_start_matches("::");
    trimmed.rfind("::").map(|idx| &trimmed[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("blog::Post"), Some("blog"));
        assert_eq!(namespace_of("app::blog::Post"), Some("app::blog"));
        assert_eq!(namespace_of("::app::Post"), Some("app"));
        assert_eq!(namespace_of("Post"), None);
    }

    #[test]
    fn test_entity_key_display() {
        let key = EntityKey::new("blog::Post", 7);
        assert_eq!(key.to_string(), "blog::Post#7");
        assert_eq!(key.namespace(), Some("blog"));
    }
}
