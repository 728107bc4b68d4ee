use serde::Serialize;

use super::discovery::RelationPolicy;
use crate::core::{EntityKey, Result, namespace_of};
use crate::mapping::{RelationKind, Registry};
use crate::transaction::Session;

/// How a deleted entity relates to one declared relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Rows of the owning type hold a reference to the entity.
    Referencing,
    /// Collections of the owning type contain the entity.
    Member,
    /// The entity owns the collection itself.
    Owner,
}

/// Rows affected by one relationship, computed fresh for every deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NotTargeted,
    Rows(Vec<EntityKey>),
    Unlinked(usize),
}

/// Decides whether deleting an entity of `entity_type` involves `relation`.
///
/// The declared target is resolved against the registry relative to the
/// deleted type's namespace, and matches the deleted type or any of its
/// ancestors. For collections the member side wins over the owner side.
pub fn target_side(registry: &Registry, relation: &RelationPolicy, entity_type: &str) -> Option<Side> {
    let is_target = registry
        .resolve_target(&relation.target, namespace_of(entity_type))
        .map(|target| registry.is_instance_of(entity_type, target.name()))
        .unwrap_or(false);

    match relation.kind {
        RelationKind::ManyToOne | RelationKind::OneToOne if is_target => Some(Side::Referencing),
        RelationKind::ManyToMany if is_target => Some(Side::Member),
        RelationKind::ManyToMany if relation.entity == entity_type => Some(Side::Owner),
        _ => None,
    }
}

/// Finds the rows `relation` links to `entity`.
///
/// Reference relationships only look rows up. Collections are unlinked in
/// place on the managed rows; the flush picks the edit up from the row
/// snapshot, so no old/new pair is registered.
pub fn resolve(session: &mut Session, relation: &RelationPolicy, entity: &EntityKey) -> Result<Resolution> {
    let side = target_side(session.registry(), relation, &entity.entity);

    match side {
        None => Ok(Resolution::NotTargeted),
        Some(Side::Referencing) => session
            .find_referencing(&relation.accessor, entity)
            .map(Resolution::Rows),
        Some(Side::Member) => {
            let owners = session.find_collection_owners(&relation.accessor, entity)?;
            let mut unlinked = 0;
            for owner in owners {
                let row = session.load_mut(&owner)?;
                let members = relation.accessor.collection_mut(row)?;
                let before = members.len();
                members.retain(|member| member != entity);
                unlinked += before - members.len();
            }
            Ok(Resolution::Unlinked(unlinked))
        }
        Some(Side::Owner) => {
            let row = session.load_mut(entity)?;
            let members = relation.accessor.collection_mut(row)?;
            let unlinked = members.len();
            members.clear();
            Ok(Resolution::Unlinked(unlinked))
        }
    }
}
