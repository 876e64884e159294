//! Generator configuration.

use crate::file::DEFAULT_MODEL_FILE;
use crate::model::PropertyType;
use std::path::PathBuf;

/// Configuration for a generator run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Path of the model JSON file.
    pub model_path: PathBuf,

    /// Fixed seed for uid generation; seeded from the OS when `None`.
    pub seed: Option<u64>,

    /// Types a property named `id` may have to be picked as the ID.
    pub id_types: Vec<PropertyType>,

    /// Whether to start a new model if the file doesn't exist.
    pub create_if_missing: bool,

    /// User document version stamped on save.
    pub version: Option<u32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            seed: None,
            id_types: vec![PropertyType::Long, PropertyType::String],
            create_if_missing: true,
            version: None,
        }
    }
}

impl GeneratorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model file path.
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Sets a fixed uid seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the types accepted for an automatically selected ID.
    #[must_use]
    pub fn id_types(mut self, types: impl Into<Vec<PropertyType>>) -> Self {
        self.id_types = types.into();
        self
    }

    /// Sets whether a missing model file starts a new model.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the user document version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}
