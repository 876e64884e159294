//! Sync command implementation.

use crate::schema;
use entimodel_core::{Generator, GeneratorConfig};
use std::path::Path;

/// Runs the sync command.
pub fn run(
    model_path: &Path,
    schema_path: &Path,
    seed: Option<u64>,
    doc_version: Option<u32>,
    create_if_missing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let drafts = schema::load(schema_path)?;

    let mut config = GeneratorConfig::new()
        .model_path(model_path)
        .create_if_missing(create_if_missing);
    if let Some(seed) = seed {
        config = config.seed(seed);
    }
    if let Some(version) = doc_version {
        config = config.version(version);
    }

    let outcome = Generator::new(config).run(&drafts)?;

    if outcome.created {
        println!("Created {}", model_path.display());
    }
    if outcome.report.is_empty() {
        println!("Model is up to date ({} entities)", outcome.model.entities.len());
    } else {
        println!("Model changes:");
        for notice in &outcome.report.notices {
            println!("  {notice}");
        }
    }

    Ok(())
}
