use thiserror::Error;

use super::types::EntityKey;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Type {0} for onSoftDelete does not exist")]
    UnknownPolicyType(String),

    #[error("{policy} is not supported for {kind} relationship '{entity}.{field}'")]
    UnsupportedCombination {
        policy: String,
        kind: String,
        entity: String,
        field: String,
    },

    #[error(
        "Exactly one field of '{entity}' must be marked as successor, found {found}"
    )]
    SuccessorConfiguration { entity: String, found: usize },

    #[error("No accessor found for '{field}' in '{entity}'")]
    Accessor { field: String, entity: String },

    #[error("Many-to-many relationship '{entity}.{field}' has no join metadata")]
    MissingJoinMetadata { entity: String, field: String },

    #[error("Field '{entity}.{field}' declares onSoftDelete but is not a relationship")]
    NotARelation { entity: String, field: String },

    #[error("Entity {0} not found")]
    EntityNotFound(EntityKey),

    #[error("Entity type '{0}' is not registered")]
    UnknownEntityType(String),

    #[error("Entity type '{0}' is not soft-deleteable")]
    NotSoftDeleteable(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cascade depth {depth} exceeded while processing {entity}")]
    CascadeDepthExceeded { depth: usize, entity: EntityKey },

    #[error("Mapping document error: {0}")]
    Mapping(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CascadeError {
    pub(crate) fn accessor(field: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::Accessor {
            field: field.into(),
            entity: entity.into(),
        }
    }

    /// True for errors caused by the mapping declarations rather than by data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPolicyType(_)
                | Self::UnsupportedCombination { .. }
                | Self::SuccessorConfiguration { .. }
                | Self::MissingJoinMetadata { .. }
                | Self::NotARelation { .. }
                | Self::Registration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CascadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_policy_message_names_value() {
        let err = CascadeError::UnknownPolicyType("FOO".to_string());
        assert_eq!(err.to_string(), "Type FOO for onSoftDelete does not exist");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_accessor_error_names_field_and_type() {
        let err = CascadeError::accessor("tags", "blog::Post");
        assert_eq!(err.to_string(), "No accessor found for 'tags' in 'blog::Post'");
        assert!(!err.is_configuration());
    }
}
