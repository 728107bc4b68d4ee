use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use onsoftdelete::listener::{Side, target_side};
use onsoftdelete::{CascadeConfig, MappingDocument, RelationPolicy, Registry, discover};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "onsoftdelete")]
#[command(about = "Inspect onSoftDelete declarations of a mapping document")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check every declaration of a mapping document
    Validate { mapping: PathBuf },
    /// List the relationships a soft delete of one entity type would touch
    Plan {
        mapping: PathBuf,
        #[arg(long)]
        entity: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct PlanEntry<'a> {
    side: Side,
    #[serde(flatten)]
    relation: &'a RelationPolicy,
}

#[derive(Serialize)]
struct Plan<'a> {
    entity: &'a str,
    config: &'a CascadeConfig,
    relations: Vec<PlanEntry<'a>>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { mapping } => validate(&mapping),
        Command::Plan {
            mapping,
            entity,
            json,
        } => plan(&mapping, &entity, json),
    }
}

fn load_document(path: &Path) -> Result<(Registry, CascadeConfig)> {
    let document = MappingDocument::from_path(path)
        .with_context(|| format!("Failed to read mapping document '{}'", path.display()))?;
    let registry = document
        .registry()
        .with_context(|| format!("Invalid entity declarations in '{}'", path.display()))?;
    Ok((registry, document.config))
}

fn validate(path: &Path) -> Result<()> {
    let (registry, config) = load_document(path)?;
    let relations = discover(&registry)
        .with_context(|| format!("Invalid onSoftDelete declaration in '{}'", path.display()))?;

    println!(
        "{}: {} entity types, {} onSoftDelete relationships",
        path.display(),
        registry.len(),
        relations.len()
    );
    println!(
        "  cascade: max_depth={}, detect_cycles={}",
        config.max_depth, config.detect_cycles
    );
    if !config.validate_on_startup {
        println!("  validate_on_startup=false is ignored here: every declaration is checked");
    }
    for relation in &relations {
        println!(
            "  {}.{} -> {} ({}, {})",
            relation.entity, relation.field, relation.target, relation.kind, relation.policy
        );
    }
    Ok(())
}

fn plan(path: &Path, entity: &str, json: bool) -> Result<()> {
    let (registry, config) = load_document(path)?;
    let entity_type = registry.entity(entity)?;
    if entity_type.is_abstract() {
        bail!("'{}' is abstract and cannot be deleted", entity);
    }
    if entity_type.soft_delete().is_none() {
        log::warn!("'{}' is not soft-deleteable", entity);
    }

    let relations = discover(&registry)?;
    let plan = Plan {
        entity,
        config: &config,
        relations: relations
            .iter()
            .filter_map(|relation| {
                target_side(&registry, relation, entity).map(|side| PlanEntry { side, relation })
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.relations.is_empty() {
        println!("Deleting {} touches no declared relationship", entity);
        return Ok(());
    }
    println!(
        "Deleting {} touches (max depth {}, cycle detection {}):",
        entity,
        config.max_depth,
        if config.detect_cycles { "on" } else { "off" }
    );
    for entry in &plan.relations {
        let action = match entry.side {
            Side::Referencing => entry.relation.policy.to_string(),
            Side::Member | Side::Owner => "unlink".to_string(),
        };
        println!(
            "  {}.{} ({}, {:?}) -> {}",
            entry.relation.entity,
            entry.relation.field,
            entry.relation.kind,
            entry.side,
            action
        );
    }
    Ok(())
}
