use serde::Serialize;

use crate::core::{CascadeError, Result};
use crate::mapping::{
    EntityType, FieldAccessor, FieldDef, FieldType, JoinTable, Policy, RelationKind, Registry,
};

/// A relationship field carrying an `onSoftDelete` declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationPolicy {
    pub entity: String,
    pub field: String,
    #[serde(skip)]
    pub accessor: FieldAccessor,
    pub policy: Policy,
    pub kind: RelationKind,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_by: Option<String>,
    pub nullable: bool,
}

/// Collects every declared relation policy of the concrete types in
/// `registry`, in registration and field order.
///
/// The whole registry is checked before anything is returned, so a bad
/// declaration fails the call even if it could never match the row being
/// deleted.
pub fn discover(registry: &Registry) -> Result<Vec<RelationPolicy>> {
    let mut relations = Vec::new();

    for entity_type in registry.types() {
        if entity_type.is_abstract() {
            continue;
        }

        for (field, accessor) in entity_type.fields_with_accessors() {
            let Some(declaration) = &field.on_soft_delete else {
                continue;
            };
            let policy = declaration.policy()?;
            let relation = relation_policy(entity_type, field, accessor, policy)?;
            validate(&relation)?;
            relations.push(relation);
        }
    }

    Ok(relations)
}

fn relation_policy(
    entity_type: &EntityType,
    field: &FieldDef,
    accessor: &FieldAccessor,
    policy: Policy,
) -> Result<RelationPolicy> {
    let (kind, target, join_table, mapped_by) = match (&field.association, &field.ty) {
        (Some(association), _) => (
            association.kind,
            association.target.clone(),
            association.join_table.clone(),
            association.mapped_by.clone(),
        ),
        (None, FieldType::Reference { target }) => {
            (RelationKind::ManyToOne, target.clone(), None, None)
        }
        (None, FieldType::Collection { target }) => {
            (RelationKind::ManyToMany, target.clone(), None, None)
        }
        (None, _) => {
            return Err(CascadeError::NotARelation {
                entity: entity_type.name().to_string(),
                field: field.name.clone(),
            });
        }
    };

    Ok(RelationPolicy {
        entity: entity_type.name().to_string(),
        field: field.name.clone(),
        accessor: accessor.clone(),
        policy,
        kind,
        target,
        join_table,
        mapped_by,
        nullable: field.nullable,
    })
}

fn validate(relation: &RelationPolicy) -> Result<()> {
    let unsupported = match (relation.policy, relation.kind) {
        (_, RelationKind::OneToMany) => true,
        (Policy::SetNull, RelationKind::ManyToMany) => true,
        (Policy::SetNull, _) => !relation.nullable,
        _ => false,
    };
    if unsupported {
        return Err(CascadeError::UnsupportedCombination {
            policy: relation.policy.to_string(),
            kind: relation.kind.to_string(),
            entity: relation.entity.clone(),
            field: relation.field.clone(),
        });
    }

    if relation.kind == RelationKind::ManyToMany
        && relation.join_table.is_none()
        && relation.mapped_by.is_none()
    {
        return Err(CascadeError::MissingJoinMetadata {
            entity: relation.entity.clone(),
            field: relation.field.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::mapping::{Association, EntityType as Type};

    fn registry_with(field: FieldDef) -> Result<Registry> {
        Registry::builder()
            .entity(Type::builder("blog::Author").field(FieldDef::scalar("id", DataType::Integer)))
            .entity(
                Type::builder("blog::Post")
                    .field(FieldDef::scalar("id", DataType::Integer))
                    .field(field),
            )
            .build()
    }

    #[test]
    fn test_discovers_policy_fields_only() {
        let registry = Registry::builder()
            .entity(Type::builder("blog::Author").field(FieldDef::scalar("id", DataType::Integer)))
            .entity(
                Type::builder("blog::Post")
                    .field(FieldDef::reference("author", "Author").on_soft_delete("set null"))
                    .field(FieldDef::reference("editor", "Author")),
            )
            .build()
            .unwrap();

        let relations = discover(&registry).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].field, "author");
        assert_eq!(relations[0].policy, Policy::SetNull);
        assert_eq!(relations[0].kind, RelationKind::ManyToOne);
        assert_eq!(relations[0].accessor.slot(), 0);
    }

    #[test]
    fn test_abstract_types_are_skipped() {
        let registry = Registry::builder()
            .entity(
                Type::builder("blog::Owned")
                    .abstract_type()
                    .field(FieldDef::reference("owner", "Author").on_soft_delete("CASCADE")),
            )
            .entity(Type::builder("blog::Author").field(FieldDef::scalar("id", DataType::Integer)))
            .entity(Type::builder("blog::Note").extends("blog::Owned"))
            .build()
            .unwrap();

        let relations = discover(&registry).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].entity, "blog::Note");
    }

    #[test]
    fn test_unknown_policy_names_value() {
        let registry =
            registry_with(FieldDef::reference("author", "Author").on_soft_delete("FOO")).unwrap();
        match discover(&registry) {
            Err(CascadeError::UnknownPolicyType(value)) => assert_eq!(value, "FOO"),
            other => panic!("Expected UnknownPolicyType, got {:?}", other),
        }
    }

    #[test]
    fn test_set_null_on_many_to_many_is_unsupported() {
        let field = FieldDef::collection("tags", "Author")
            .association(
                Association::many_to_many("Author")
                    .join_table(JoinTable::new("post_tag", "post_id", "tag_id")),
            )
            .on_soft_delete("SET NULL");
        let registry = registry_with(field).unwrap();
        assert!(matches!(
            discover(&registry),
            Err(CascadeError::UnsupportedCombination { .. })
        ));
    }

    #[test]
    fn test_set_null_on_required_field_is_unsupported() {
        let field = FieldDef::reference("author", "Author")
            .not_null()
            .on_soft_delete("SET NULL");
        let registry = registry_with(field).unwrap();
        assert!(matches!(
            discover(&registry),
            Err(CascadeError::UnsupportedCombination { .. })
        ));
    }

    #[test]
    fn test_one_to_many_is_unsupported() {
        let field = FieldDef::collection("posts", "Author")
            .association(Association::one_to_many("Author", "post"))
            .on_soft_delete("CASCADE");
        let registry = registry_with(field).unwrap();
        match discover(&registry) {
            Err(CascadeError::UnsupportedCombination { kind, .. }) => {
                assert_eq!(kind, "one-to-many")
            }
            other => panic!("Expected UnsupportedCombination, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_without_join_metadata() {
        let field = FieldDef::collection("tags", "Author").on_soft_delete("CASCADE");
        let registry = registry_with(field).unwrap();
        assert!(matches!(
            discover(&registry),
            Err(CascadeError::MissingJoinMetadata { .. })
        ));
    }

    #[test]
    fn test_policy_on_scalar_field() {
        let field = FieldDef::scalar("title", DataType::Text).on_soft_delete("CASCADE");
        let registry = registry_with(field).unwrap();
        assert!(matches!(
            discover(&registry),
            Err(CascadeError::NotARelation { .. })
        ));
    }
}
