use serde::Serialize;

use crate::core::{EntityKey, Value};

/// One field rewritten by the cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub key: EntityKey,
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// What a single soft delete did to the rows around it.
///
/// `soft_deleted` is in marking order, so a row always appears after the rows
/// that were cascaded from it. The root is not listed; the session marks it
/// after the listener returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeReport {
    pub root: EntityKey,
    pub nullified: Vec<FieldChange>,
    pub redirected: Vec<FieldChange>,
    pub soft_deleted: Vec<EntityKey>,
    pub removed: Vec<EntityKey>,
    pub unlinked: usize,
    pub skipped: Vec<EntityKey>,
    pub max_depth: usize,
}

impl CascadeReport {
    pub fn new(root: EntityKey) -> Self {
        Self {
            root,
            nullified: Vec::new(),
            redirected: Vec::new(),
            soft_deleted: Vec::new(),
            removed: Vec::new(),
            unlinked: 0,
            skipped: Vec::new(),
            max_depth: 0,
        }
    }

    /// Number of rows or links changed, root excluded
    pub fn affected(&self) -> usize {
        self.nullified.len()
            + self.redirected.len()
            + self.soft_deleted.len()
            + self.removed.len()
            + self.unlinked
    }

    pub fn is_empty(&self) -> bool {
        self.affected() == 0
    }
}
