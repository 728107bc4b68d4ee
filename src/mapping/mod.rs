pub mod annotation;
pub mod document;
pub mod field;
pub mod registry;

pub use annotation::{OnSoftDelete, Policy, SoftDeleteable};
pub use document::{EntityDocument, MappingDocument};
pub use field::{Association, FieldAccessor, FieldDef, FieldType, JoinTable, RelationKind};
pub use registry::{EntityType, EntityTypeBuilder, Registry, RegistryBuilder};
