use serde::Serialize;

use crate::core::{EntityKey, Result, Row};
use crate::mapping::FieldAccessor;

/// Counters kept by a store for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub queries: usize,
    pub loads: usize,
    pub writes: usize,
}

/// Storage trait - the query and persistence side the cascade pipeline talks to
pub trait EntityStore {
    /// Load one row by key
    fn load(&self, key: &EntityKey) -> Result<Option<Row>>;

    /// Keys of rows of `accessor.entity()` whose field equals a reference to `target`
    fn find_by(&self, accessor: &FieldAccessor, target: &EntityKey) -> Result<Vec<EntityKey>>;

    /// Keys of rows of `accessor.entity()` whose collection field contains `member`
    fn find_members(&self, accessor: &FieldAccessor, member: &EntityKey) -> Result<Vec<EntityKey>>;

    /// Insert a new row
    fn insert(&mut self, key: EntityKey, row: Row) -> Result<()>;

    /// Replace an existing row
    fn update(&mut self, key: &EntityKey, row: Row) -> Result<()>;

    /// Physically remove a row; returns false when it did not exist
    fn delete(&mut self, key: &EntityKey) -> Result<bool>;

    fn stats(&self) -> StoreStats {
        StoreStats::default()
    }
}
