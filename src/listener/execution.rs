use std::collections::HashSet;
use std::sync::Arc;

use super::discovery::RelationPolicy;
use super::report::FieldChange;
use crate::core::{EntityKey, Result, Value};
use crate::transaction::Session;

/// What CASCADE decided for one referencing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    /// Soft delete the row after its own dependents
    SoftDelete(EntityKey),
    /// Row was scheduled for physical removal
    Removed(EntityKey),
    /// Row was marked before this cascade started
    AlreadyDeleted(EntityKey),
    /// Row was marked earlier in this cascade
    Settled(EntityKey),
    /// Row is an ancestor of the row being entered
    InProgress(EntityKey),
}

/// Rows the cascade has entered but not yet marked, and rows it has marked.
///
/// `entered` is the current path from the root, so only a row found in it
/// closes a cycle. A row that is merely queued is neither entered nor marked.
#[derive(Debug, Default)]
pub struct CascadeProgress {
    entered: HashSet<EntityKey>,
    marked: HashSet<EntityKey>,
}

impl CascadeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, key: EntityKey) {
        self.entered.insert(key);
    }

    pub fn mark(&mut self, key: &EntityKey) {
        self.entered.remove(key);
        self.marked.insert(key.clone());
    }

    pub fn is_entered(&self, key: &EntityKey) -> bool {
        self.entered.contains(key)
    }

    pub fn is_marked(&self, key: &EntityKey) -> bool {
        self.marked.contains(key)
    }
}

/// Writes `null` into the relation field of `row`.
pub fn set_null(session: &mut Session, relation: &RelationPolicy, row: &EntityKey) -> Result<FieldChange> {
    rewrite(session, relation, row, Value::Null)
}

/// Re-points the relation field of `row` to `successor`.
pub fn redirect(
    session: &mut Session,
    relation: &RelationPolicy,
    row: &EntityKey,
    successor: &Value,
) -> Result<FieldChange> {
    rewrite(session, relation, row, successor.clone())
}

fn rewrite(session: &mut Session, relation: &RelationPolicy, row: &EntityKey, new: Value) -> Result<FieldChange> {
    let old = session.write_tracked(row, &relation.accessor, new.clone())?;
    Ok(FieldChange {
        key: row.clone(),
        field: relation.field.clone(),
        old,
        new,
    })
}

/// Reads the successor of `deleted` from its single successor-marked field.
///
/// The type is checked before the row is loaded, so a misconfigured type
/// fails without touching anything.
pub fn successor_value(session: &mut Session, deleted: &EntityKey) -> Result<Value> {
    let registry = Arc::clone(session.registry());
    let accessor = registry.entity(&deleted.entity)?.successor_accessor()?;
    let row = session.load(deleted)?;
    Ok(accessor.get(row)?.clone())
}

/// Applies CASCADE to one referencing row.
///
/// Soft-deleteable owners are queued for a nested soft delete unless they are
/// already marked or on the current cascade path; everything else is removed.
pub fn cascade(session: &mut Session, row: &EntityKey, progress: &CascadeProgress) -> Result<CascadeStep> {
    let registry = Arc::clone(session.registry());
    let owner = registry.entity(&row.entity)?;

    let config = match owner.soft_delete() {
        Some(config) if !config.hard_delete => config,
        _ => {
            session.remove(row)?;
            return Ok(CascadeStep::Removed(row.clone()));
        }
    };

    if progress.is_marked(row) {
        return Ok(CascadeStep::Settled(row.clone()));
    }
    let accessor = owner.accessor(&config.field)?;
    if !accessor.get(session.load(row)?)?.is_null() {
        return Ok(CascadeStep::AlreadyDeleted(row.clone()));
    }
    if progress.is_entered(row) {
        return Ok(CascadeStep::InProgress(row.clone()));
    }

    Ok(CascadeStep::SoftDelete(row.clone()))
}
