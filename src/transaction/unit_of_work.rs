use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Level, event};

use super::change::Change;
use crate::core::{EntityKey, Result, Row, Value};
use crate::storage::EntityStore;

#[derive(Debug, Clone)]
struct ManagedRow {
    original: Row,
    current: Row,
}

/// Outcome of a flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub updated: usize,
    pub removed: usize,
}

/// Identity map plus pending changes for one session.
///
/// Rows are loaded once and mutated in place; `flush` writes rows whose
/// current state differs from the loaded snapshot, rows with scheduled extra
/// updates, and removals.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    identity_map: BTreeMap<EntityKey, ManagedRow>,
    changes: Vec<Change>,
    extra_updates: BTreeMap<EntityKey, BTreeMap<String, (Value, Value)>>,
    removals: BTreeSet<EntityKey>,
}

/// Managed rows and pending changes captured by [`UnitOfWork::savepoint`].
#[derive(Debug)]
pub struct Savepoint(UnitOfWork);

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.clone())
    }

    /// Discard every row mutation and change registered after `savepoint`.
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        *self = savepoint.0;
    }

    pub fn is_managed(&self, key: &EntityKey) -> bool {
        self.identity_map.contains_key(key)
    }

    /// Start tracking a row in its clean state. Already managed rows are kept.
    pub fn manage(&mut self, key: EntityKey, row: Row) {
        self.identity_map.entry(key).or_insert_with(|| ManagedRow {
            original: row.clone(),
            current: row,
        });
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Row> {
        self.identity_map.get(key).map(|managed| &managed.current)
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Row> {
        self.identity_map.get_mut(key).map(|managed| &mut managed.current)
    }

    /// Managed keys of one entity type
    pub fn managed_keys_of(&self, entity: &str) -> Vec<EntityKey> {
        self.identity_map
            .keys()
            .filter(|key| key.entity == entity)
            .cloned()
            .collect()
    }

    pub fn property_changed(&mut self, key: &EntityKey, field: &str, old: Value, new: Value) {
        self.changes.push(Change::PropertyChanged {
            key: key.clone(),
            field: field.to_string(),
            old,
            new,
        });
    }

    pub fn schedule_extra_update(&mut self, key: &EntityKey, field: &str, old: Value, new: Value) {
        self.changes.push(Change::ExtraUpdate {
            key: key.clone(),
            field: field.to_string(),
            old: old.clone(),
            new: new.clone(),
        });
        self.extra_updates
            .entry(key.clone())
            .or_default()
            .insert(field.to_string(), (old, new));
    }

    pub fn schedule_removal(&mut self, key: &EntityKey) {
        if self.removals.insert(key.clone()) {
            self.changes.push(Change::Removal { key: key.clone() });
        }
    }

    pub fn is_scheduled_for_removal(&self, key: &EntityKey) -> bool {
        self.removals.contains(key)
    }

    /// Every change registered since the last flush, in order
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Property changes registered for one row
    pub fn property_changes(&self, key: &EntityKey) -> Vec<&Change> {
        self.changes
            .iter()
            .filter(|change| matches!(change, Change::PropertyChanged { .. }) && change.key() == key)
            .collect()
    }

    pub fn extra_updates(&self, key: &EntityKey) -> Option<&BTreeMap<String, (Value, Value)>> {
        self.extra_updates.get(key)
    }

    /// Managed rows that would be written by the next flush
    pub fn dirty_keys(&self) -> Vec<EntityKey> {
        self.identity_map
            .iter()
            .filter(|(key, managed)| {
                !self.removals.contains(*key)
                    && (managed.current != managed.original || self.extra_updates.contains_key(*key))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn flush(&mut self, store: &mut dyn EntityStore) -> Result<FlushSummary> {
        let mut summary = FlushSummary::default();

        for key in self.dirty_keys() {
            if let Some(managed) = self.identity_map.get_mut(&key) {
                store.update(&key, managed.current.clone())?;
                managed.original = managed.current.clone();
                summary.updated += 1;
            }
        }

        for key in std::mem::take(&mut self.removals) {
            if store.delete(&key)? {
                summary.removed += 1;
            }
            self.identity_map.remove(&key);
        }

        self.changes.clear();
        self.extra_updates.clear();

        event!(
            Level::DEBUG,
            updated = summary.updated,
            removed = summary.removed,
            "unit of work flushed"
        );
        Ok(summary)
    }

    /// Forget all managed rows and pending changes
    pub fn clear(&mut self) {
        self.identity_map.clear();
        self.changes.clear();
        self.extra_updates.clear();
        self.removals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_flush_writes_only_dirty_rows() {
        let mut store = MemoryStore::new();
        let clean = EntityKey::new("blog::Post", 1);
        let dirty = EntityKey::new("blog::Post", 2);
        store.insert(clean.clone(), vec![Value::Integer(1)]).unwrap();
        store.insert(dirty.clone(), vec![Value::Integer(2)]).unwrap();

        let mut uow = UnitOfWork::new();
        uow.manage(clean.clone(), store.load(&clean).unwrap().unwrap());
        uow.manage(dirty.clone(), store.load(&dirty).unwrap().unwrap());
        uow.get_mut(&dirty).unwrap()[0] = Value::Integer(20);

        assert_eq!(uow.dirty_keys(), vec![dirty.clone()]);
        let summary = uow.flush(&mut store).unwrap();
        assert_eq!(summary, FlushSummary { updated: 1, removed: 0 });
        assert_eq!(store.load(&dirty).unwrap().unwrap(), vec![Value::Integer(20)]);
        assert!(uow.dirty_keys().is_empty());
    }

    #[test]
    fn test_extra_update_forces_write() {
        let mut store = MemoryStore::new();
        let key = EntityKey::new("blog::Post", 1);
        store.insert(key.clone(), vec![Value::Null]).unwrap();

        let mut uow = UnitOfWork::new();
        uow.manage(key.clone(), vec![Value::Null]);
        uow.schedule_extra_update(&key, "author", Value::Null, Value::Null);

        assert_eq!(uow.dirty_keys(), vec![key.clone()]);
        assert_eq!(uow.flush(&mut store).unwrap().updated, 1);
    }

    #[test]
    fn test_removal_is_registered_once() {
        let mut store = MemoryStore::new();
        let key = EntityKey::new("blog::Post", 1);
        store.insert(key.clone(), vec![Value::Null]).unwrap();

        let mut uow = UnitOfWork::new();
        uow.manage(key.clone(), vec![Value::Null]);
        uow.schedule_removal(&key);
        uow.schedule_removal(&key);
        assert_eq!(uow.changes().len(), 1);

        let summary = uow.flush(&mut store).unwrap();
        assert_eq!(summary.removed, 1);
        assert!(store.load(&key).unwrap().is_none());
        assert!(!uow.is_managed(&key));
    }

    #[test]
    fn test_manage_keeps_existing_state() {
        let key = EntityKey::new("blog::Post", 1);
        let mut uow = UnitOfWork::new();
        uow.manage(key.clone(), vec![Value::Integer(1)]);
        uow.get_mut(&key).unwrap()[0] = Value::Integer(2);
        uow.manage(key.clone(), vec![Value::Integer(1)]);
        assert_eq!(uow.get(&key).unwrap(), &vec![Value::Integer(2)]);
    }

    #[test]
    fn test_rollback_restores_rows_and_changes() {
        let key = EntityKey::new("blog::Post", 1);
        let mut uow = UnitOfWork::new();
        uow.manage(key.clone(), vec![Value::Integer(1)]);

        let savepoint = uow.savepoint();
        uow.get_mut(&key).unwrap()[0] = Value::Null;
        uow.property_changed(&key, "author", Value::Integer(1), Value::Null);
        uow.schedule_extra_update(&key, "author", Value::Integer(1), Value::Null);
        uow.schedule_removal(&EntityKey::new("blog::Like", 1));

        uow.rollback_to(savepoint);
        assert_eq!(uow.get(&key).unwrap(), &vec![Value::Integer(1)]);
        assert!(uow.changes().is_empty());
        assert!(uow.extra_updates(&key).is_none());
        assert!(uow.dirty_keys().is_empty());
        assert!(!uow.is_scheduled_for_removal(&EntityKey::new("blog::Like", 1)));
    }
}
