// ============================================================================
// Change Tracking
// ============================================================================
//
// Every mutation the cascade pipeline performs on a managed row is recorded
// here with an explicit old/new pair, so it can be flushed (or inspected)
// even when the field would not otherwise look dirty.
//
// ============================================================================

use serde::Serialize;

use crate::core::{EntityKey, Value};

/// A single tracked change inside a unit of work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Change {
    /// A field was mutated outside the normal dirty check
    PropertyChanged {
        key: EntityKey,
        field: String,
        old: Value,
        new: Value,
    },

    /// An additional update was scheduled for the next flush
    ExtraUpdate {
        key: EntityKey,
        field: String,
        old: Value,
        new: Value,
    },

    /// The row is scheduled for physical removal
    Removal { key: EntityKey },
}

impl Change {
    /// Key of the row affected by this change
    pub fn key(&self) -> &EntityKey {
        match self {
            Change::PropertyChanged { key, .. } => key,
            Change::ExtraUpdate { key, .. } => key,
            Change::Removal { key } => key,
        }
    }

    /// Field name for field-level changes
    pub fn field(&self) -> Option<&str> {
        match self {
            Change::PropertyChanged { field, .. } | Change::ExtraUpdate { field, .. } => {
                Some(field)
            }
            Change::Removal { .. } => None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Change::Removal { .. })
    }
}
