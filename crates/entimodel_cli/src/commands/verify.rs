//! Verify command implementation.

use entimodel_core::ModelFile;
use std::path::Path;

/// Runs the verify command.
///
/// Loading a model validates it; any violation is returned as the error.
pub fn run(model_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying model at {}", model_path.display());

    let mut file = ModelFile::open(model_path, false)?;
    let Some(model) = file.load()? else {
        println!("Model file is empty (no generator run has completed yet)");
        return Ok(());
    };

    let properties: usize = model.entities.iter().map(|e| e.properties.len()).sum();
    let relations: usize = model.entities.iter().map(|e| e.relations.len()).sum();
    println!(
        "OK: {} entities, {} properties, {} relations",
        model.entities.len(),
        properties,
        relations
    );

    Ok(())
}
