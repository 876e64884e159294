//! JSON schema descriptions.
//!
//! A minimal front-end for the engine: entities and fields are listed in a
//! JSON document with their annotations written in the tag language.
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "name": "Task",
//!       "annotations": "relation(name=tags,to=Tag)",
//!       "comments": ["Things to do."],
//!       "fields": [
//!         { "name": "id", "type": "long", "unsigned": true },
//!         { "name": "text", "type": "string", "annotations": "index" },
//!         { "name": "embedding", "type": "float", "vector": true,
//!           "annotations": "index=hnsw, hnsw-dimensions=3" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use entimodel_core::{EntityDraft, FieldDraft, ModelError, PropertyType, ResultExt};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading a schema description.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The file could not be read.
    #[error("can't read schema {}: {source}", path.display())]
    Read {
        /// Schema path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid schema description.
    #[error("invalid schema {}: {source}", path.display())]
    Parse {
        /// Schema path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A field type name is not known.
    #[error("entity {entity:?} field {field:?}: {message}")]
    UnknownType {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// An annotation could not be parsed.
    #[error(transparent)]
    Annotation(#[from] ModelError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    entities: Vec<EntityDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDescription {
    name: String,
    #[serde(default)]
    annotations: String,
    #[serde(default)]
    comments: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDescription {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    unsigned: bool,
    #[serde(default)]
    vector: bool,
    #[serde(default)]
    annotations: String,
}

/// Reads a schema description file into entity drafts.
pub fn load(path: &Path) -> Result<Vec<EntityDraft>, SchemaError> {
    let text = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: SchemaDocument =
        serde_json::from_str(&text).map_err(|source| SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    document.entities.iter().map(entity_draft).collect()
}

fn entity_draft(description: &EntityDescription) -> Result<EntityDraft, SchemaError> {
    let mut draft = EntityDraft::new(&description.name)
        .annotate(&description.annotations)
        .at(|| format!("entity {:?}", description.name))?;
    for line in &description.comments {
        draft = draft.doc(line);
    }
    for field in &description.fields {
        draft = draft.field(field_draft(&description.name, field)?);
    }
    Ok(draft)
}

fn field_draft(entity: &str, description: &FieldDescription) -> Result<FieldDraft, SchemaError> {
    let base_type: PropertyType =
        description
            .type_name
            .parse()
            .map_err(|message| SchemaError::UnknownType {
                entity: entity.to_string(),
                field: description.name.clone(),
                message,
            })?;

    let mut draft = if description.vector {
        FieldDraft::vector(&description.name, base_type)
    } else {
        FieldDraft::new(&description.name, base_type)
    };
    if description.unsigned {
        draft = draft.unsigned();
    }
    let draft = draft
        .annotate(&description.annotations)
        .at(|| format!("entity {entity:?} property {:?}", description.name))?;
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn load_str(json: &str) -> Result<Vec<EntityDraft>, SchemaError> {
        let temp = tempdir().unwrap();
        let path = temp.path().join("schema.json");
        fs::write(&path, json).unwrap();
        load(&path)
    }

    #[test]
    fn full_description() {
        let drafts = load_str(
            r#"{"entities": [{
                "name": "Task",
                "annotations": "relation(name=tags,to=Tag)",
                "comments": ["Things to do."],
                "fields": [
                    {"name": "id", "type": "long", "unsigned": true},
                    {"name": "text", "type": "String", "annotations": "index"},
                    {"name": "embedding", "type": "float", "vector": true}
                ]
            }]}"#,
        )
        .unwrap();

        let task = &drafts[0];
        assert_eq!(task.name, "Task");
        assert_eq!(task.documentation_lines, ["Things to do."]);
        assert_eq!(task.annotations.relations().count(), 1);
        assert!(task.fields[0].unsigned);
        assert_eq!(task.fields[1].base_type, PropertyType::String);
        assert!(task.fields[1].annotations.contains("index"));
        assert_eq!(
            task.fields[2].property_type().unwrap(),
            PropertyType::FloatVector
        );
    }

    #[test]
    fn unknown_type() {
        let err = load_str(
            r#"{"entities": [{"name": "Task", "fields": [{"name": "id", "type": "uuid"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn annotation_errors_carry_the_path() {
        let err = load_str(
            r#"{"entities": [{"name": "Task", "fields": [{"name": "id", "type": "long", "annotations": "sync"}]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("entity \"Task\" property \"id\": "));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_str(r#"{"entities": [], "extra": 1}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Parse { .. }));
    }

    #[test]
    fn missing_file() {
        let err = load(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }
}
