// ============================================================================
// onsoftdelete Library
// ============================================================================
//
// Cascading onSoftDelete policies for an entity mapping layer. A field that
// references another entity can declare what happens to its row when the
// referenced entity is soft-deleted:
//
// - SET NULL:  the reference is cleared
// - CASCADE:   the row is soft-deleted too (or removed, for hard-delete types)
// - SUCCESSOR: the reference is re-pointed to the deleted entity's successor
//
// ============================================================================

pub mod config;
pub mod core;
pub mod listener;
pub mod mapping;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use config::CascadeConfig;
pub use self::core::{CascadeError, DataType, EntityId, EntityKey, Result, Row, Value};
pub use listener::{
    CascadeReport, EventKind, EventLog, FieldChange, LifecycleEvent, LifecycleListener,
    RelationPolicy, SoftDeleteListener, SoftDeleteObserver, discover,
};
pub use mapping::{
    Association, EntityType, FieldAccessor, FieldDef, FieldType, JoinTable, MappingDocument,
    OnSoftDelete, Policy, RelationKind, Registry, SoftDeleteable,
};
pub use storage::{EntityStore, MemoryStore, StoreStats};
pub use transaction::{Change, FlushSummary, Savepoint, Session, UnitOfWork};

// ============================================================================
// Quick start
// ============================================================================

/// Builds a session over `store` with the cascade listener registered and
/// the registry validated.
///
/// # Examples
///
/// ```
/// use onsoftdelete::{DataType, EntityKey, EntityType, FieldDef, MemoryStore, Registry, Value};
///
/// # fn main() -> onsoftdelete::Result<()> {
/// let registry = Registry::builder()
///     .entity(
///         EntityType::builder("blog::Author")
///             .field(FieldDef::scalar("name", DataType::Text))
///             .field(FieldDef::timestamp("deleted_at"))
///             .soft_deleteable("deleted_at"),
///     )
///     .entity(
///         EntityType::builder("blog::Post")
///             .field(FieldDef::reference("author", "Author").on_soft_delete("SET NULL")),
///     )
///     .build()?;
///
/// let mut session = onsoftdelete::open(registry, MemoryStore::new())?;
/// let author = EntityKey::new("blog::Author", 1);
/// let post = EntityKey::new("blog::Post", 1);
/// session.insert(author.clone(), [("name", Value::from("Ada"))])?;
/// session.insert(post.clone(), [("author", Value::from(author.clone()))])?;
///
/// session.soft_delete(&author)?;
/// assert!(session.value(&post, "author")?.is_null());
/// assert_eq!(session.flush()?.updated, 2);
/// # Ok(())
/// # }
/// ```
pub fn open(registry: Registry, store: impl EntityStore + 'static) -> Result<Session> {
    Session::with_cascade(std::sync::Arc::new(registry), store, CascadeConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_invalid_declarations() {
        let registry = Registry::builder()
            .entity(EntityType::builder("blog::Author"))
            .entity(
                EntityType::builder("blog::Post")
                    .field(FieldDef::reference("author", "Author").on_soft_delete("FOO")),
            )
            .build()
            .unwrap();

        let result = open(registry, MemoryStore::new());
        assert!(matches!(result, Err(CascadeError::UnknownPolicyType(_))));
    }
}
