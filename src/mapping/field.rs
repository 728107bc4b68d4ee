use serde::{Deserialize, Serialize};
use std::fmt;

use super::annotation::OnSoftDelete;
use crate::core::{CascadeError, DataType, EntityKey, Result, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ManyToOne,
    OneToOne,
    ManyToMany,
    OneToMany,
}

impl RelationKind {
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::ManyToMany | Self::OneToMany)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManyToOne => write!(f, "many-to-one"),
            Self::OneToOne => write!(f, "one-to-one"),
            Self::ManyToMany => write!(f, "many-to-many"),
            Self::OneToMany => write!(f, "one-to-many"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    pub name: String,
    pub join_column: String,
    pub inverse_join_column: String,
}

impl JoinTable {
    pub fn new(
        name: impl Into<String>,
        join_column: impl Into<String>,
        inverse_join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            join_column: join_column.into(),
            inverse_join_column: inverse_join_column.into(),
        }
    }
}

/// Association metadata of a relationship field, as the mapping layer knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub kind: RelationKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_by: Option<String>,
}

impl Association {
    pub fn new(kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            join_table: None,
            mapped_by: None,
        }
    }

    pub fn many_to_one(target: impl Into<String>) -> Self {
        Self::new(RelationKind::ManyToOne, target)
    }

    pub fn one_to_one(target: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToOne, target)
    }

    pub fn many_to_many(target: impl Into<String>) -> Self {
        Self::new(RelationKind::ManyToMany, target)
    }

    pub fn one_to_many(target: impl Into<String>, mapped_by: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToMany, target).mapped_by(mapped_by)
    }

    pub fn join_table(mut self, join_table: JoinTable) -> Self {
        self.join_table = Some(join_table);
        self
    }

    pub fn mapped_by(mut self, field: impl Into<String>) -> Self {
        self.mapped_by = Some(field.into());
        self
    }

    pub fn has_join_metadata(&self) -> bool {
        self.join_table.is_some() || self.mapped_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Scalar { data_type: DataType },
    Timestamp,
    Reference { target: String },
    Collection { target: String },
}

impl FieldType {
    pub fn default_value(&self) -> Value {
        match self {
            Self::Collection { .. } => Value::Refs(Vec::new()),
            _ => Value::Null,
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Scalar { data_type }, value) => data_type.is_compatible(value),
            (Self::Timestamp, Value::Null | Value::Timestamp(_)) => true,
            (Self::Reference { .. }, Value::Null | Value::Ref(_)) => true,
            (Self::Collection { .. }, Value::Refs(_)) => true,
            _ => false,
        }
    }
}

fn default_nullable() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub ty: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<Association>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_soft_delete: Option<OnSoftDelete>,
    /// Marks the field whose value replaces references under `SUCCESSOR`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub successor: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            association: None,
            on_soft_delete: None,
            successor: false,
        }
    }

    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, FieldType::Scalar { data_type })
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::Reference {
                target: target.into(),
            },
        )
    }

    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::Collection {
                target: target.into(),
            },
        )
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.association = Some(association);
        self
    }

    pub fn on_soft_delete(mut self, declaration: impl Into<OnSoftDelete>) -> Self {
        self.on_soft_delete = Some(declaration.into());
        self
    }

    pub fn successor(mut self) -> Self {
        self.successor = true;
        self
    }
}

/// Slot capability for one field of one entity type.
///
/// Resolved once when the registry is built; reading and writing a row goes
/// through the slot index instead of a field-name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldAccessor {
    entity: String,
    field: String,
    slot: usize,
}

impl FieldAccessor {
    pub(crate) fn new(entity: impl Into<String>, field: impl Into<String>, slot: usize) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            slot,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn get<'r>(&self, row: &'r Row) -> Result<&'r Value> {
        row.get(self.slot)
            .ok_or_else(|| CascadeError::accessor(&self.field, &self.entity))
    }

    /// Writes `value` and returns the previous one.
    pub fn set(&self, row: &mut Row, value: Value) -> Result<Value> {
        let slot = row
            .get_mut(self.slot)
            .ok_or_else(|| CascadeError::accessor(&self.field, &self.entity))?;
        Ok(std::mem::replace(slot, value))
    }

    pub fn collection_mut<'r>(&self, row: &'r mut Row) -> Result<&'r mut Vec<EntityKey>> {
        match row.get_mut(self.slot) {
            Some(Value::Refs(members)) => Ok(members),
            _ => Err(CascadeError::accessor(&self.field, &self.entity)),
        }
    }
}
