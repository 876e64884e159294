//! Error types for the model evolution engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while processing, merging or persisting a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed `"id:uid"` text or a zero component where none is allowed.
    #[error("malformed id '{text}': {reason}")]
    MalformedId {
        /// The offending text.
        text: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The annotation text could not be tokenized.
    #[error("invalid annotation format: {message} at position {position} in `{text}`")]
    MalformedAnnotation {
        /// Description of the problem.
        message: String,
        /// Byte offset into `text`.
        position: usize,
        /// The annotation text being parsed.
        text: String,
    },

    /// The same annotation was given twice.
    #[error("duplicate annotation {name}")]
    DuplicateAnnotation {
        /// Annotation key.
        name: String,
    },

    /// An annotation is not allowed in this position.
    #[error("unknown annotation '{name}'")]
    UnknownAnnotation {
        /// Annotation name.
        name: String,
    },

    /// A boolean detail was given a value.
    #[error("detail '{name}' is a flag and must not have a value, found '{value}'")]
    InvalidBooleanDetail {
        /// Detail name.
        name: String,
        /// The value that was supplied.
        value: String,
    },

    /// A required detail of a grouped annotation is missing or empty.
    #[error("annotation `{annotation}` requires a non-empty `{detail}`")]
    MissingDetail {
        /// Annotation name.
        annotation: String,
        /// Missing detail name.
        detail: String,
    },

    /// An annotation value could not be applied.
    #[error("invalid `{annotation}` annotation: {message}")]
    InvalidAnnotation {
        /// Annotation name.
        annotation: String,
        /// Description of the problem.
        message: String,
    },

    /// A field type has no property type counterpart.
    #[error("unsupported type: {message}")]
    UnsupportedType {
        /// Description of the type.
        message: String,
    },

    /// An annotation requires a different underlying type.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// Annotations that exclude each other were given together.
    #[error("conflicting annotations: {message}")]
    ConflictingAnnotations {
        /// Description of the conflict.
        message: String,
    },

    /// The schema asked for the Uid of an element with an empty `uid` annotation.
    #[error("uid annotation value must not be empty on {element}: {message}")]
    UidRequested {
        /// Description of the element, e.g. `entity Task`.
        element: String,
        /// The information the user asked for.
        message: String,
    },

    /// No stored entity has the requested Uid.
    #[error("entity with uid {uid} was not found")]
    UnknownEntityUid {
        /// The requested Uid.
        uid: u64,
    },

    /// No stored property has the requested Uid.
    #[error("property with uid {uid} not found in '{entity}'")]
    UnknownPropertyUid {
        /// Owning entity name.
        entity: String,
        /// The requested Uid.
        uid: u64,
    },

    /// No stored standalone relation has the requested Uid.
    #[error("relation with uid {uid} not found in '{entity}'")]
    UnknownRelationUid {
        /// Owning entity name.
        entity: String,
        /// The requested Uid.
        uid: u64,
    },

    /// Two schema elements resolved to the same stored element.
    #[error("ambiguous rename: {message}")]
    AmbiguousRename {
        /// Description of the clash.
        message: String,
    },

    /// More than one property qualifies as the implicit ID.
    #[error("multiple properties recognized as an ID: {first} and {second}")]
    AmbiguousIdAutoselect {
        /// First candidate name.
        first: String,
        /// Second candidate name.
        second: String,
    },

    /// No property is marked or recognized as the ID.
    #[error("no property recognized as an ID")]
    NoIdProperty,

    /// Two elements in the same scope share a case-insensitive name.
    #[error("duplicate {kind} name '{name}' (note that names are case insensitive)")]
    DuplicateName {
        /// `entity`, `property` or `relation`.
        kind: &'static str,
        /// The clashing name.
        name: String,
    },

    /// A loaded identifier is above the last assigned identifier of its scope.
    #[error("id monotonicity violated: {message}")]
    IdMonotonicityViolation {
        /// Description of the violation.
        message: String,
    },

    /// A Uid appears in more than one place.
    #[error("uid {uid} is used more than once: {message}")]
    UidCollision {
        /// The duplicated Uid.
        uid: u64,
        /// Where it was seen.
        message: String,
    },

    /// The to-one/to-many relation graph contains a cycle.
    #[error("relation cycle detected: {path} ({target})")]
    RelationCycle {
        /// Dotted path from the starting entity through the relations.
        path: String,
        /// Entity that closes the cycle.
        target: String,
    },

    /// The model document is older than this engine supports.
    #[error(
        "the loaded model is too old - version {version} while the minimum supported is {minimum} - \
         consider upgrading with an older generator or manually"
    )]
    ModelTooOld {
        /// Document version.
        version: u32,
        /// Minimum supported version.
        minimum: u32,
    },

    /// The model document requires a newer engine.
    #[error(
        "the loaded model has been created with a newer generator version {version} \
         while the maximum supported version is {maximum}"
    )]
    ModelTooNew {
        /// Document version.
        version: u32,
        /// Maximum supported version.
        maximum: u32,
    },

    /// Another process holds the model file lock.
    #[error("model file locked: another process has exclusive access to {}", path.display())]
    ModelLocked {
        /// Path of the model file.
        path: PathBuf,
    },

    /// The model document could not be parsed.
    #[error("model file is corrupt: {message}")]
    ModelCorrupt {
        /// Description of the problem.
        message: String,
    },

    /// A structural invariant of the model does not hold.
    #[error("{message}")]
    InvalidModel {
        /// Description of the problem.
        message: String,
    },

    /// No free Uid could be found.
    #[error("could not generate a unique uid in {attempts} attempts")]
    UidGenerationExhausted {
        /// Number of candidates tried.
        attempts: u32,
    },

    /// A binding emitter failed.
    #[error("emitter failed: {message}")]
    Emitter {
        /// Description of the failure.
        message: String,
    },

    /// An error with the location in the model where it happened.
    #[error("{path}: {source}")]
    Context {
        /// Location, e.g. `entity "Foo" property "bar"`.
        path: String,
        /// The underlying error.
        #[source]
        source: Box<ModelError>,
    },
}

impl ModelError {
    /// Creates a malformed id error.
    pub fn malformed_id(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedId {
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed annotation error.
    pub fn malformed_annotation(
        message: impl Into<String>,
        position: usize,
        text: impl Into<String>,
    ) -> Self {
        Self::MalformedAnnotation {
            message: message.into(),
            position,
            text: text.into(),
        }
    }

    /// Creates an invalid annotation error.
    pub fn invalid_annotation(annotation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAnnotation {
            annotation: annotation.into(),
            message: message.into(),
        }
    }

    /// Creates a missing detail error.
    pub fn missing_detail(annotation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MissingDetail {
            annotation: annotation.into(),
            detail: detail.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Creates a conflicting annotations error.
    pub fn conflicting(message: impl Into<String>) -> Self {
        Self::ConflictingAnnotations {
            message: message.into(),
        }
    }

    /// Creates an invalid model error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }

    /// Creates a corrupt model error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::ModelCorrupt {
            message: message.into(),
        }
    }

    /// Creates an id monotonicity error.
    pub fn monotonicity(message: impl Into<String>) -> Self {
        Self::IdMonotonicityViolation {
            message: message.into(),
        }
    }

    /// Creates an ambiguous rename error.
    pub fn ambiguous_rename(message: impl Into<String>) -> Self {
        Self::AmbiguousRename {
            message: message.into(),
        }
    }

    /// Wraps the error with a location path.
    #[must_use]
    pub fn at(self, path: impl Into<String>) -> Self {
        Self::Context {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all location wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension for attaching a location path to fallible results.
pub trait ResultExt<T> {
    /// Wraps the error, if any, with the path produced by `path`.
    fn at<P: Into<String>>(self, path: impl FnOnce() -> P) -> ModelResult<T>;
}

impl<T> ResultExt<T> for ModelResult<T> {
    fn at<P: Into<String>>(self, path: impl FnOnce() -> P) -> ModelResult<T> {
        self.map_err(|e| e.at(path()))
    }
}
