//! Schema drafts: the normalized entity list a front-end hands to the engine.

use crate::annotation::Annotations;
use crate::error::{ModelError, ModelResult};
use crate::model::PropertyType;
use crate::processor::{ENTITY_ANNOTATIONS, PROPERTY_ANNOTATIONS};

/// An entity as declared in a schema source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDraft {
    /// Declared name.
    pub name: String,
    /// Documentation comment lines.
    pub documentation_lines: Vec<String>,
    /// Entity annotations.
    pub annotations: Annotations,
    /// Fields in declaration order.
    pub fields: Vec<FieldDraft>,
}

impl EntityDraft {
    /// Creates a draft without fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses and adds entity annotations.
    pub fn annotate(mut self, text: &str) -> ModelResult<Self> {
        self.annotations.parse_into(text, ENTITY_ANNOTATIONS)?;
        Ok(self)
    }

    /// Adds a documentation line.
    #[must_use]
    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.documentation_lines.push(line.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDraft) -> Self {
        self.fields.push(field);
        self
    }
}

/// A field as declared in a schema source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDraft {
    /// Declared name.
    pub name: String,
    /// Scalar type, or the container type for vectors.
    pub base_type: PropertyType,
    /// Declared as an unsigned integer.
    pub unsigned: bool,
    /// Declared as a vector of `vector_element_type`.
    pub is_vector: bool,
    /// Element type of a vector field.
    pub vector_element_type: Option<PropertyType>,
    /// Field annotations.
    pub annotations: Annotations,
}

impl FieldDraft {
    /// Creates a scalar field.
    #[must_use]
    pub fn new(name: impl Into<String>, base_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            base_type,
            unsigned: false,
            is_vector: false,
            vector_element_type: None,
            annotations: Annotations::new(),
        }
    }

    /// Creates a vector field.
    #[must_use]
    pub fn vector(name: impl Into<String>, element: PropertyType) -> Self {
        Self {
            is_vector: true,
            vector_element_type: Some(element),
            ..Self::new(name, element)
        }
    }

    /// Marks the field as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Parses and adds field annotations.
    pub fn annotate(mut self, text: &str) -> ModelResult<Self> {
        self.annotations.parse_into(text, PROPERTY_ANNOTATIONS)?;
        Ok(self)
    }

    /// Resolves the property type of the field.
    pub fn property_type(&self) -> ModelResult<PropertyType> {
        if self.is_vector {
            return match self.vector_element_type {
                Some(PropertyType::String) => Ok(PropertyType::StringVector),
                Some(PropertyType::Byte) => Ok(PropertyType::ByteVector),
                Some(PropertyType::Float) => Ok(PropertyType::FloatVector),
                Some(other) => Err(ModelError::UnsupportedType {
                    message: format!("vector of {other}"),
                }),
                None => Err(ModelError::UnsupportedType {
                    message: "vector without an element type".to_string(),
                }),
            };
        }
        match self.base_type {
            PropertyType::Relation => Err(ModelError::UnsupportedType {
                message: "relation fields are declared as long with `relation=Target`".to_string(),
            }),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_element_types() {
        let t = |e| FieldDraft::vector("v", e).property_type();
        assert_eq!(t(PropertyType::String).unwrap(), PropertyType::StringVector);
        assert_eq!(t(PropertyType::Byte).unwrap(), PropertyType::ByteVector);
        assert_eq!(t(PropertyType::Float).unwrap(), PropertyType::FloatVector);
        assert!(matches!(
            t(PropertyType::Int).unwrap_err(),
            ModelError::UnsupportedType { .. }
        ));
    }

    #[test]
    fn scalar_types_pass_through() {
        let f = FieldDraft::new("n", PropertyType::Double);
        assert_eq!(f.property_type().unwrap(), PropertyType::Double);
        assert!(FieldDraft::new("r", PropertyType::Relation)
            .property_type()
            .is_err());
    }

    #[test]
    fn builders_parse_annotations() {
        let draft = EntityDraft::new("Task")
            .annotate("sync")
            .unwrap()
            .doc("A task.")
            .field(FieldDraft::new("id", PropertyType::Long).unsigned().annotate("id").unwrap());
        assert!(draft.annotations.contains("sync"));
        assert_eq!(draft.documentation_lines, ["A task."]);
        assert!(draft.fields[0].unsigned);
        assert!(draft.fields[0].annotations.contains("id"));

        assert!(EntityDraft::new("X").annotate("index").is_err());
        assert!(FieldDraft::new("x", PropertyType::Int).annotate("sync").is_err());
    }
}
