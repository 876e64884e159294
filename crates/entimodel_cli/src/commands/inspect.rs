//! Inspect command implementation.

use entimodel_core::{Entity, Model, ModelFile};
use serde::Serialize;
use std::path::Path;

/// Model inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Model file path.
    pub path: String,
    /// Format version of the document.
    pub model_version: u32,
    /// User document version.
    pub version: u64,
    /// Highest entity id ever assigned.
    pub last_entity_id: String,
    /// Highest index id ever assigned.
    pub last_index_id: String,
    /// Highest relation id ever assigned.
    pub last_relation_id: String,
    /// Number of retired uids per kind.
    pub retired: RetiredCounts,
    /// Entities in schema order.
    pub entities: Vec<EntitySummary>,
}

/// Number of retired uids per kind.
#[derive(Debug, Serialize)]
pub struct RetiredCounts {
    /// Retired entity uids.
    pub entities: usize,
    /// Retired property uids.
    pub properties: usize,
    /// Retired index uids.
    pub indexes: usize,
    /// Retired relation uids.
    pub relations: usize,
}

/// Summary of a single entity.
#[derive(Debug, Serialize)]
pub struct EntitySummary {
    /// Entity name.
    pub name: String,
    /// `id:uid` of the entity.
    pub id: String,
    /// Property summaries, one line each.
    pub properties: Vec<String>,
    /// Standalone relation summaries, one line each.
    pub relations: Vec<String>,
}

/// Runs the inspect command.
pub fn run(model_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = ModelFile::open(model_path, false)?;
    let model = file
        .load()?
        .ok_or_else(|| format!("model file {} is empty", model_path.display()))?;
    let result = inspect(model_path, &model);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, model: &Model) -> InspectResult {
    let id_text = |id: Option<entimodel_core::IdUid>| id.map(|i| i.to_string()).unwrap_or_default();
    InspectResult {
        path: path.display().to_string(),
        model_version: model.model_version,
        version: model.version,
        last_entity_id: id_text(model.last_entity_id),
        last_index_id: id_text(model.last_index_id),
        last_relation_id: id_text(model.last_relation_id),
        retired: RetiredCounts {
            entities: model.retired_entity_uids.len(),
            properties: model.retired_property_uids.len(),
            indexes: model.retired_index_uids.len(),
            relations: model.retired_relation_uids.len(),
        },
        entities: model.entities.iter().map(|e| summarize(model, e)).collect(),
    }
}

fn summarize(model: &Model, entity: &Entity) -> EntitySummary {
    let properties = entity
        .properties
        .iter()
        .map(|p| {
            let mut line = format!("{} {} {}", p.id, p.name, p.property_type);
            if !p.flags.is_empty() {
                line.push_str(&format!(" flags={}", p.flags.bits()));
            }
            if let Some(index) = p.index_id {
                line.push_str(&format!(" index={index}"));
            }
            if !p.relation_target.is_empty() {
                line.push_str(&format!(" -> {}", p.relation_target));
            }
            line
        })
        .collect();

    let relations = entity
        .relations
        .iter()
        .map(|r| {
            let target = r
                .target_id
                .and_then(|id| model.entities.iter().find(|e| e.id == id))
                .map_or("?", |e| e.name.as_str());
            format!("{} {} -> {}", r.id, r.name, target)
        })
        .collect();

    EntitySummary {
        name: entity.name.clone(),
        id: entity.id.to_string(),
        properties,
        relations,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("EntiModel Model Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!("Model version: {}", result.model_version);
    println!("Document version: {}", result.version);
    println!();
    println!("Last ids:");
    println!("  Entity:   {}", result.last_entity_id);
    println!("  Index:    {}", result.last_index_id);
    println!("  Relation: {}", result.last_relation_id);
    println!();
    println!("Retired uids:");
    println!("  Entities:   {}", result.retired.entities);
    println!("  Properties: {}", result.retired.properties);
    println!("  Indexes:    {}", result.retired.indexes);
    println!("  Relations:  {}", result.retired.relations);

    for entity in &result.entities {
        println!();
        println!("Entity {} [{}]", entity.name, entity.id);
        for property in &entity.properties {
            println!("  {property}");
        }
        for relation in &entity.relations {
            println!("  relation {relation}");
        }
    }
}
