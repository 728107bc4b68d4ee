use std::collections::{HashMap, HashSet};

use super::annotation::SoftDeleteable;
use super::field::{FieldAccessor, FieldDef, FieldType, RelationKind};
use crate::core::{CascadeError, Result, Row, Value, namespace_of};

/// A registered entity type with its fields resolved (inherited fields first).
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    parent: Option<String>,
    is_abstract: bool,
    ancestors: Vec<String>,
    fields: Vec<FieldDef>,
    accessors: Vec<FieldAccessor>,
    soft_delete: Option<SoftDeleteable>,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        namespace_of(&self.name)
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn fields_with_accessors(&self) -> impl Iterator<Item = (&FieldDef, &FieldAccessor)> {
        self.fields.iter().zip(self.accessors.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn accessor(&self, field: &str) -> Result<&FieldAccessor> {
        self.accessors
            .iter()
            .find(|accessor| accessor.field() == field)
            .ok_or_else(|| CascadeError::accessor(field, &self.name))
    }

    pub fn soft_delete(&self) -> Option<&SoftDeleteable> {
        self.soft_delete.as_ref()
    }

    pub fn soft_delete_accessor(&self) -> Result<Option<&FieldAccessor>> {
        match &self.soft_delete {
            Some(config) => self.accessor(&config.field).map(Some),
            None => Ok(None),
        }
    }

    /// The single field marked as successor.
    pub fn successor_accessor(&self) -> Result<&FieldAccessor> {
        let mut marked = self
            .fields_with_accessors()
            .filter(|(field, _)| field.successor)
            .map(|(_, accessor)| accessor);

        match (marked.next(), marked.count()) {
            (Some(accessor), 0) => Ok(accessor),
            (first, rest) => Err(CascadeError::SuccessorConfiguration {
                entity: self.name.clone(),
                found: usize::from(first.is_some()) + rest,
            }),
        }
    }

    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.name == type_name || self.ancestors.iter().any(|ancestor| ancestor == type_name)
    }

    /// Builds a row in field order. Unlisted fields take their default value.
    pub fn row<'a, I>(&self, values: I) -> Result<Row>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut row: Row = self.fields.iter().map(|field| field.ty.default_value()).collect();

        for (name, value) in values {
            let field = self.field(name).ok_or_else(|| {
                CascadeError::Registration(format!(
                    "Field '{}' is not declared on '{}'",
                    name, self.name
                ))
            })?;
            if !field.ty.is_compatible(&value) {
                return Err(CascadeError::Registration(format!(
                    "Field '{}.{}' cannot hold a {} value",
                    self.name,
                    name,
                    value.type_name()
                )));
            }
            self.accessor(name)?.set(&mut row, value)?;
        }

        Ok(row)
    }
}

/// Declaration of an entity type, resolved by [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    name: String,
    parent: Option<String>,
    is_abstract: bool,
    fields: Vec<FieldDef>,
    soft_delete: Option<SoftDeleteable>,
}

impl EntityTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            fields: Vec::new(),
            soft_delete: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn soft_deleteable(mut self, field: impl Into<String>) -> Self {
        self.soft_delete = Some(SoftDeleteable::new(field));
        self
    }

    pub fn soft_delete(mut self, config: SoftDeleteable) -> Self {
        self.soft_delete = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Static mapping registry: every entity type known to the session.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Entity types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.index.get(name).map(|idx| &self.types[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entity(&self, name: &str) -> Result<&EntityType> {
        self.get(name)
            .ok_or_else(|| CascadeError::UnknownEntityType(name.to_string()))
    }

    /// Resolves a relationship target name to a registered type.
    ///
    /// Candidates in order: the name as written, the name rooted at the
    /// global namespace, the name relative to `namespace`.
    pub fn resolve_target(&self, name: &str, namespace: Option<&str>) -> Option<&EntityType> {
        if let Some(found) = self.get(name) {
            return Some(found);
        }

        let rooted = name.trim_start_matches("::");
        if let Some(found) = self.get(rooted) {
            return Some(found);
        }

        namespace.and_then(|ns| self.get(&format!("{}::{}", ns, rooted)))
    }

    pub fn is_instance_of(&self, type_name: &str, target: &str) -> bool {
        self.get(type_name)
            .map(|entity_type| entity_type.is_instance_of(target))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    declarations: Vec<EntityTypeBuilder>,
}

impl RegistryBuilder {
    pub fn entity(mut self, declaration: EntityTypeBuilder) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn build(self) -> Result<Registry> {
        let mut by_name: HashMap<&str, &EntityTypeBuilder> = HashMap::new();
        for declaration in &self.declarations {
            if by_name.insert(declaration.name.as_str(), declaration).is_some() {
                return Err(CascadeError::Registration(format!(
                    "Entity type '{}' registered twice",
                    declaration.name
                )));
            }
        }

        let mut types = Vec::with_capacity(self.declarations.len());
        let mut index = HashMap::new();

        for declaration in &self.declarations {
            let chain = parent_chain(declaration, &by_name)?;
            let entity_type = resolve_type(declaration, &chain)?;
            validate_type(&entity_type)?;
            index.insert(entity_type.name.clone(), types.len());
            types.push(entity_type);
        }

        Ok(Registry { types, index })
    }
}

fn parent_chain<'a>(
    declaration: &'a EntityTypeBuilder,
    by_name: &HashMap<&str, &'a EntityTypeBuilder>,
) -> Result<Vec<&'a EntityTypeBuilder>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([declaration.name.as_str()]);
    let mut current = declaration;

    while let Some(parent) = current.parent.as_deref() {
        let parent_decl = by_name.get(parent).copied().ok_or_else(|| {
            CascadeError::Registration(format!(
                "Entity type '{}' extends unknown type '{}'",
                current.name, parent
            ))
        })?;
        if !seen.insert(parent_decl.name.as_str()) {
            return Err(CascadeError::Registration(format!(
                "Inheritance cycle through '{}'",
                parent
            )));
        }
        chain.push(parent_decl);
        current = parent_decl;
    }

    Ok(chain)
}

fn resolve_type(declaration: &EntityTypeBuilder, chain: &[&EntityTypeBuilder]) -> Result<EntityType> {
    let mut fields: Vec<FieldDef> = Vec::new();
    for ancestor in chain.iter().rev() {
        fields.extend(ancestor.fields.iter().cloned());
    }
    fields.extend(declaration.fields.iter().cloned());

    let mut names = HashSet::new();
    for field in &fields {
        if !names.insert(field.name.as_str()) {
            return Err(CascadeError::Registration(format!(
                "Field '{}' declared twice on '{}'",
                field.name, declaration.name
            )));
        }
    }

    let accessors = fields
        .iter()
        .enumerate()
        .map(|(slot, field)| FieldAccessor::new(&declaration.name, &field.name, slot))
        .collect();

    let soft_delete = declaration
        .soft_delete
        .clone()
        .or_else(|| chain.iter().find_map(|ancestor| ancestor.soft_delete.clone()));

    Ok(EntityType {
        name: declaration.name.clone(),
        parent: declaration.parent.clone(),
        is_abstract: declaration.is_abstract,
        ancestors: chain.iter().map(|ancestor| ancestor.name.clone()).collect(),
        fields,
        accessors,
        soft_delete,
    })
}

fn validate_type(entity_type: &EntityType) -> Result<()> {
    if let Some(config) = entity_type.soft_delete() {
        match entity_type.field(&config.field) {
            Some(field) if field.ty == FieldType::Timestamp => {}
            Some(_) => {
                return Err(CascadeError::Registration(format!(
                    "Soft-delete field '{}.{}' must be a timestamp",
                    entity_type.name, config.field
                )));
            }
            None => {
                return Err(CascadeError::Registration(format!(
                    "Soft-delete field '{}' is not declared on '{}'",
                    config.field, entity_type.name
                )));
            }
        }
    }

    for field in entity_type.fields() {
        if let Some(association) = &field.association {
            let shape_matches = match (&field.ty, association.kind.is_collection()) {
                (FieldType::Reference { .. }, false) => true,
                (FieldType::Collection { .. }, true) => true,
                _ => false,
            };
            if !shape_matches {
                return Err(CascadeError::Registration(format!(
                    "Field '{}.{}' cannot carry a {} association",
                    entity_type.name, field.name, association.kind
                )));
            }
            if association.kind == RelationKind::OneToMany && association.mapped_by.is_none() {
                return Err(CascadeError::Registration(format!(
                    "One-to-many field '{}.{}' needs mapped_by",
                    entity_type.name, field.name
                )));
            }
        }

        if field.successor && !matches!(field.ty, FieldType::Reference { .. }) {
            return Err(CascadeError::Registration(format!(
                "Successor field '{}.{}' must be a reference",
                entity_type.name, field.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn blog_registry() -> Registry {
        Registry::builder()
            .entity(
                EntityType::builder("blog::Node")
                    .abstract_type()
                    .field(FieldDef::scalar("id", DataType::Integer))
                    .field(FieldDef::timestamp("deleted_at"))
                    .soft_deleteable("deleted_at"),
            )
            .entity(
                EntityType::builder("blog::Author")
                    .extends("blog::Node")
                    .field(FieldDef::scalar("name", DataType::Text))
                    .field(FieldDef::reference("replacement", "Author").successor()),
            )
            .entity(
                EntityType::builder("blog::Post")
                    .extends("blog::Node")
                    .field(FieldDef::reference("author", "Author").on_soft_delete("SET NULL")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_inherited_fields_come_first() {
        let registry = blog_registry();
        let author = registry.entity("blog::Author").unwrap();
        let names: Vec<&str> = author.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "deleted_at", "name", "replacement"]);
        assert_eq!(author.accessor("name").unwrap().slot(), 2);
        assert_eq!(author.soft_delete().unwrap().field, "deleted_at");
        assert!(author.is_instance_of("blog::Node"));
        assert!(!author.is_abstract());
    }

    #[test]
    fn test_resolve_target_order() {
        let registry = blog_registry();
        assert_eq!(
            registry.resolve_target("blog::Author", None).unwrap().name(),
            "blog::Author"
        );
        assert_eq!(
            registry.resolve_target("::blog::Author", None).unwrap().name(),
            "blog::Author"
        );
        assert_eq!(
            registry.resolve_target("Author", Some("blog")).unwrap().name(),
            "blog::Author"
        );
        assert!(registry.resolve_target("Author", Some("shop")).is_none());
    }

    #[test]
    fn test_successor_accessor_requires_exactly_one() {
        let registry = blog_registry();
        let author = registry.entity("blog::Author").unwrap();
        assert_eq!(author.successor_accessor().unwrap().field(), "replacement");

        let post = registry.entity("blog::Post").unwrap();
        match post.successor_accessor() {
            Err(CascadeError::SuccessorConfiguration { found, .. }) => assert_eq!(found, 0),
            other => panic!("Expected SuccessorConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let result = Registry::builder()
            .entity(EntityType::builder("shop::Order").extends("shop::Missing"))
            .build();
        assert!(matches!(result, Err(CascadeError::Registration(_))));
    }

    #[test]
    fn test_inheritance_cycle_is_rejected() {
        let result = Registry::builder()
            .entity(EntityType::builder("a::A").extends("a::B"))
            .entity(EntityType::builder("a::B").extends("a::A"))
            .build();
        assert!(matches!(result, Err(CascadeError::Registration(_))));
    }

    #[test]
    fn test_soft_delete_field_must_be_timestamp() {
        let result = Registry::builder()
            .entity(
                EntityType::builder("a::Item")
                    .field(FieldDef::scalar("deleted_at", DataType::Text))
                    .soft_deleteable("deleted_at"),
            )
            .build();
        assert!(matches!(result, Err(CascadeError::Registration(_))));
    }

    #[test]
    fn test_row_builder_checks_types() {
        let registry = blog_registry();
        let post = registry.entity("blog::Post").unwrap();
        let row = post
            .row([("id", Value::Integer(1)), ("author", Value::reference("blog::Author", 3))])
            .unwrap();
        assert_eq!(row.len(), 3);
        assert!(row[1].is_null());

        assert!(post.row([("author", Value::Integer(3))]).is_err());
        assert!(post.row([("missing", Value::Integer(3))]).is_err());
    }
}
