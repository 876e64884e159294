//! The persisted model document.
//!
//! A [`ModelFile`] holds an exclusive advisory lock on the model JSON for as
//! long as it is alive, so that two generator runs on the same project can't
//! interleave their read-merge-write cycles. The lock is released when the
//! handle is dropped.

use crate::error::{ModelError, ModelResult, ResultExt};
use crate::model::{Model, MIN_MODEL_VERSION};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default file name of the model document.
pub const DEFAULT_MODEL_FILE: &str = "objectbox-model.json";

/// An open, locked model document.
#[derive(Debug)]
pub struct ModelFile {
    path: PathBuf,
    file: File,
}

impl ModelFile {
    /// Opens the model file and locks it exclusively.
    ///
    /// A missing file is created empty when `create_if_missing` is set; its
    /// content is only written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns `ModelLocked` if another process holds the lock, or an I/O
    /// error if the file can't be opened.
    pub fn open(path: &Path, create_if_missing: bool) -> ModelResult<Self> {
        if !path.exists() && !create_if_missing {
            return Err(ModelError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model file does not exist: {}", path.display()),
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_if_missing)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ModelError::ModelLocked {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), "opened model file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the path of the model file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the stored model.
    ///
    /// Returns `None` for an empty file, i.e. one that was just created or
    /// left behind by a run that failed before saving.
    pub fn load(&mut self) -> ModelResult<Option<Model>> {
        let mut data = String::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_string(&mut data)?;

        if data.trim().is_empty() {
            debug!(path = %self.path.display(), "model file is empty");
            return Ok(None);
        }

        let model = parse_model(&data).at(|| format!("model file {}", self.path.display()))?;
        debug!(
            path = %self.path.display(),
            entities = model.entities.len(),
            version = model.model_version,
            "loaded model"
        );
        Ok(Some(model))
    }

    /// Replaces the file content with `model` and flushes it to disk.
    pub fn save(&mut self, model: &Model) -> ModelResult<()> {
        let json = to_json(model)?;
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(json.as_bytes())?;
        self.file.sync_all()?;
        debug!(path = %self.path.display(), bytes = json.len(), "saved model");
        Ok(())
    }
}

/// Parses a model document, applies compatibility fill-ins and validates it.
pub fn parse_model(json: &str) -> ModelResult<Model> {
    let mut model: Model =
        serde_json::from_str(json).map_err(|e| ModelError::corrupt(e.to_string()))?;

    // documents written before the version fields existed are version 4
    if model.model_version == 0 && model.minimum_parser_version == 0 && model.note1.is_empty() {
        model.model_version = MIN_MODEL_VERSION;
        model.minimum_parser_version = MIN_MODEL_VERSION;
    }
    model.fill_missing();

    model.validate()?;
    Ok(model)
}

/// Serializes a model the way it is stored: pretty-printed with two-space
/// indentation and a trailing newline.
pub fn to_json(model: &Model) -> ModelResult<String> {
    let mut json =
        serde_json::to_string_pretty(model).map_err(|e| ModelError::corrupt(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyFlags, PropertyType, MODEL_VERSION};
    use crate::uid::UidGenerator;
    use tempfile::tempdir;

    fn model() -> Model {
        let mut m = Model::new(UidGenerator::from_seed(11));
        let task = m.create_entity("Task").unwrap();
        let id = m.create_property(task, "id", PropertyType::Long).unwrap();
        m.entities[task].properties[id].add_flags(PropertyFlags::ID);
        m.create_property(task, "text", PropertyType::String).unwrap();
        m
    }

    #[test]
    fn missing_file_is_created_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);

        let mut file = ModelFile::open(&path, true).unwrap();
        assert!(path.exists());
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn missing_file_without_create_fails() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);
        assert!(matches!(
            ModelFile::open(&path, false),
            Err(ModelError::Io(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);

        let _first = ModelFile::open(&path, true).unwrap();
        let result = ModelFile::open(&path, true);
        assert!(matches!(result, Err(ModelError::ModelLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);
        {
            let _file = ModelFile::open(&path, true).unwrap();
        }
        let _again = ModelFile::open(&path, true).unwrap();
    }

    #[test]
    fn save_then_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);
        let original = model();

        let mut file = ModelFile::open(&path, true).unwrap();
        file.save(&original).unwrap();
        let loaded = file.load().unwrap().unwrap();
        assert_eq!(to_json(&loaded).unwrap(), to_json(&original).unwrap());

        // a shorter document fully replaces a longer one
        file.save(&Model::new(UidGenerator::from_seed(1))).unwrap();
        let loaded = file.load().unwrap().unwrap();
        assert!(loaded.entities.is_empty());
    }

    #[test]
    fn document_layout() {
        let json = to_json(&model()).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.starts_with("{\n  \"_note1\": \"KEEP THIS FILE!"));
        let keys: Vec<usize> = [
            "\"entities\"",
            "\"lastEntityId\"",
            "\"lastIndexId\"",
            "\"modelVersion\"",
            "\"modelVersionParserMinimum\"",
            "\"retiredEntityUids\"",
            "\"retiredRelationUids\"",
            "\"version\"",
        ]
        .iter()
        .map(|k| json.find(k).unwrap())
        .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn legacy_document_is_version_4() {
        let json = r#"{
            "entities": [],
            "lastEntityId": "",
            "lastIndexId": "",
            "retiredEntityUids": [],
            "retiredIndexUids": [],
            "retiredPropertyUids": []
        }"#;
        let model = parse_model(json).unwrap();
        assert_eq!(model.model_version, 4);
        assert_eq!(model.minimum_parser_version, 4);
        assert_eq!(model.note1, crate::model::NOTE1);
    }

    #[test]
    fn missing_retired_lists_are_corrupt() {
        let json = r#"{"entities": [], "modelVersion": 5}"#;
        assert!(matches!(
            parse_model(json),
            Err(ModelError::ModelCorrupt { .. })
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            parse_model("{not json"),
            Err(ModelError::ModelCorrupt { .. })
        ));
    }

    #[test]
    fn loaded_model_is_validated() {
        let mut m = model();
        m.last_entity_id = None;
        let json = to_json(&m).unwrap();
        assert!(parse_model(&json).is_err());

        let mut m = model();
        m.model_version = MODEL_VERSION + 1;
        m.minimum_parser_version = MODEL_VERSION + 1;
        let err = parse_model(&to_json(&m).unwrap()).unwrap_err();
        assert!(matches!(err, ModelError::ModelTooNew { .. }));
    }

    #[test]
    fn load_errors_name_the_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DEFAULT_MODEL_FILE);
        std::fs::write(&path, "[]").unwrap();

        let mut file = ModelFile::open(&path, false).unwrap();
        let err = file.load().unwrap_err();
        assert!(err.to_string().starts_with("model file "));
        assert!(matches!(err.root(), ModelError::ModelCorrupt { .. }));
    }
}
