use std::collections::BTreeMap;

use crate::core::{CascadeError, EntityId, Result, Row, Value};

/// Rows of one entity type, ordered by primary key.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    rows: BTreeMap<EntityId, Row>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert(&mut self, id: EntityId, row: Row) -> Result<()> {
        if self.rows.contains_key(&id) {
            return Err(CascadeError::Storage(format!(
                "Duplicate key {} in '{}'",
                id, self.name
            )));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    /// Returns false when no row with this id exists.
    pub fn update(&mut self, id: &EntityId, row: Row) -> bool {
        match self.rows.get_mut(id) {
            Some(existing) => {
                *existing = row;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: &EntityId) -> bool {
        self.rows.remove(id).is_some()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Row> {
        self.rows.get(id)
    }

    /// Ids of rows whose value at `slot` satisfies `predicate`.
    pub fn scan_slot<F>(&self, slot: usize, predicate: F) -> Vec<EntityId>
    where
        F: Fn(&Value) -> bool,
    {
        self.rows
            .iter()
            .filter(|(_, row)| row.get(slot).map(&predicate).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let mut table = Table::new("blog::Post");
        table.insert(EntityId::Int(1), vec![Value::Null]).unwrap();
        assert!(table.insert(EntityId::Int(1), vec![Value::Null]).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_scan_slot() {
        let mut table = Table::new("blog::Post");
        table.insert(EntityId::Int(1), vec![Value::Integer(5)]).unwrap();
        table.insert(EntityId::Int(2), vec![Value::Integer(7)]).unwrap();
        table.insert(EntityId::Int(3), vec![]).unwrap();

        let ids = table.scan_slot(0, |value| *value == Value::Integer(7));
        assert_eq!(ids, vec![EntityId::Int(2)]);
    }
}
