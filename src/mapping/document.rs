// ============================================================================
// Mapping Documents
// ============================================================================
//
// JSON form of a registry: entity types, their fields, delete policies and
// successor markers, plus the cascade configuration.
//
// ============================================================================

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::annotation::SoftDeleteable;
use super::field::FieldDef;
use super::registry::{EntityType, Registry};
use crate::config::CascadeConfig;
use crate::core::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<SoftDeleteable>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub config: CascadeConfig,
    pub entities: Vec<EntityDocument>,
}

impl MappingDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn registry(&self) -> Result<Registry> {
        if self.entities.is_empty() {
            warn!("mapping document declares no entity types");
        }

        let mut builder = Registry::builder();
        for entity in &self.entities {
            let mut declaration = EntityType::builder(&entity.name);
            if let Some(parent) = &entity.extends {
                declaration = declaration.extends(parent);
            }
            if entity.is_abstract {
                declaration = declaration.abstract_type();
            }
            if let Some(config) = &entity.soft_delete {
                declaration = declaration.soft_delete(config.clone());
            }
            for field in &entity.fields {
                declaration = declaration.field(field.clone());
            }
            builder = builder.entity(declaration);
        }
        builder.build()
    }
}
