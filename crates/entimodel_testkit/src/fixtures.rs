//! Test fixtures and project helpers.
//!
//! Provides a temporary project directory holding a model file, and
//! builders for the schemas most tests start from.

use entimodel_core::{
    parse_model, EntityDraft, FieldDraft, Generator, GeneratorConfig, Model, ModelResult, Outcome,
    PropertyType, DEFAULT_MODEL_FILE,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Seed used by [`TestProject::new`].
pub const DEFAULT_SEED: u64 = 0x5EED;

/// A temporary project directory with a model file.
pub struct TestProject {
    seed: u64,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl TestProject {
    /// Creates an empty project using [`DEFAULT_SEED`].
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Creates an empty project with the given uid seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the path of the model file.
    pub fn model_path(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_MODEL_FILE)
    }

    /// Returns the generator configuration of this project.
    pub fn config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .model_path(self.model_path())
            .seed(self.seed)
    }

    /// Runs the generator with `schema`.
    pub fn run(&self, schema: &[EntityDraft]) -> ModelResult<Outcome> {
        Generator::new(self.config()).run(schema)
    }

    /// Returns the raw model file, or an empty string before the first run.
    pub fn contents(&self) -> String {
        fs::read_to_string(self.model_path()).unwrap_or_default()
    }

    /// Parses the model file.
    pub fn load(&self) -> Model {
        parse_model(&self.contents()).expect("Failed to parse model file")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// An entity with an `id` field of type unsigned long.
pub fn entity(name: &str) -> EntityDraft {
    EntityDraft::new(name).field(FieldDraft::new("id", PropertyType::Long).unsigned())
}

/// `Task { id: uint64; text: string }`.
pub fn task_schema() -> Vec<EntityDraft> {
    vec![entity("Task").field(FieldDraft::new("text", PropertyType::String))]
}

/// Entities where each links to the next with a to-one relation, and the
/// last one links back to the first.
///
/// A single name produces a self-relation.
pub fn relation_ring(names: &[&str]) -> Vec<EntityDraft> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let target = names[(i + 1) % names.len()];
            entity(name).field(
                FieldDraft::new(format!("{}Id", target.to_lowercase()), PropertyType::Long)
                    .unsigned()
                    .annotate(&format!("relation={target}"))
                    .expect("Invalid relation annotation"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_runs_and_loads() {
        let project = TestProject::new();
        assert_eq!(project.contents(), "");
        let outcome = project.run(&task_schema()).unwrap();
        assert_eq!(project.load().entities[0].id, outcome.model.entities[0].id);
    }

    #[test]
    fn ring_links_back() {
        let ring = relation_ring(&["A", "B", "C"]);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring[2].fields[1].name, "aId");
        assert!(ring[2].fields[1].annotations.contains("relation"));
    }
}
