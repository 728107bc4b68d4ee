use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::engine::{EntityStore, StoreStats};
use super::table::Table;
use crate::core::{CascadeError, EntityKey, Result, Row, Value};
use crate::mapping::FieldAccessor;

/// In-memory store, one table per entity type
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    queries: AtomicUsize,
    loads: AtomicUsize,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, entity: &str) -> Option<&Table> {
        self.tables.get(entity)
    }

    /// Number of rows stored for an entity type
    pub fn row_count(&self, entity: &str) -> usize {
        self.tables.get(entity).map(Table::len).unwrap_or(0)
    }

    fn scan(&self, accessor: &FieldAccessor, predicate: impl Fn(&Value) -> bool) -> Vec<EntityKey> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        match self.tables.get(accessor.entity()) {
            Some(table) => table
                .scan_slot(accessor.slot(), predicate)
                .into_iter()
                .map(|id| EntityKey {
                    entity: accessor.entity().to_string(),
                    id,
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

impl EntityStore for MemoryStore {
    fn load(&self, key: &EntityKey) -> Result<Option<Row>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .get(&key.entity)
            .and_then(|table| table.get(&key.id))
            .cloned())
    }

    fn find_by(&self, accessor: &FieldAccessor, target: &EntityKey) -> Result<Vec<EntityKey>> {
        Ok(self.scan(accessor, |value| value.as_ref_key() == Some(target)))
    }

    fn find_members(&self, accessor: &FieldAccessor, member: &EntityKey) -> Result<Vec<EntityKey>> {
        Ok(self.scan(accessor, |value| {
            value.as_refs().map(|members| members.contains(member)).unwrap_or(false)
        }))
    }

    fn insert(&mut self, key: EntityKey, row: Row) -> Result<()> {
        self.writes += 1;
        self.tables
            .entry(key.entity.clone())
            .or_insert_with(|| Table::new(key.entity.clone()))
            .insert(key.id, row)
    }

    fn update(&mut self, key: &EntityKey, row: Row) -> Result<()> {
        self.writes += 1;
        let updated = self
            .tables
            .get_mut(&key.entity)
            .map(|table| table.update(&key.id, row))
            .unwrap_or(false);
        if !updated {
            return Err(CascadeError::EntityNotFound(key.clone()));
        }
        Ok(())
    }

    fn delete(&mut self, key: &EntityKey) -> Result<bool> {
        self.writes += 1;
        Ok(self
            .tables
            .get_mut(&key.entity)
            .map(|table| table.delete(&key.id))
            .unwrap_or(false))
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            queries: self.queries.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            writes: self.writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accessor() -> FieldAccessor {
        FieldAccessor::new("blog::Post", "author", 0)
    }

    #[test]
    fn test_find_by_reference() {
        let mut store = MemoryStore::new();
        let author = EntityKey::new("blog::Author", 1);
        store
            .insert(EntityKey::new("blog::Post", 1), vec![Value::Ref(author.clone())])
            .unwrap();
        store
            .insert(EntityKey::new("blog::Post", 2), vec![Value::Null])
            .unwrap();

        let found = store.find_by(&accessor(), &author).unwrap();
        assert_eq!(found, vec![EntityKey::new("blog::Post", 1)]);
        assert_eq!(store.stats().queries, 1);
    }

    #[test]
    fn test_find_members() {
        let mut store = MemoryStore::new();
        let tag = EntityKey::new("blog::Tag", 3);
        store
            .insert(
                EntityKey::new("blog::Post", 1),
                vec![Value::Refs(vec![EntityKey::new("blog::Tag", 2), tag.clone()])],
            )
            .unwrap();

        let found = store.find_members(&accessor(), &tag).unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.find_by(&accessor(), &tag).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_row_fails() {
        let mut store = MemoryStore::new();
        let result = store.update(&EntityKey::new("blog::Post", 1), vec![]);
        assert!(matches!(result, Err(CascadeError::EntityNotFound(_))));
    }

    #[test]
    fn test_query_on_unknown_table_is_empty() {
        let store = MemoryStore::new();
        let found = store
            .find_by(&accessor(), &EntityKey::new("blog::Author", 1))
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(store.row_count("blog::Post"), 0);
    }
}
