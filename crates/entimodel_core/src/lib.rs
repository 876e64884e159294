//! # EntiModel Core
//!
//! Model evolution engine for entity schema code generators.
//!
//! A schema front-end hands the engine a list of [`EntityDraft`]s. The engine
//! applies their annotations, reconciles the result with the model JSON file
//! kept next to the sources, and writes the file back with stable
//! identifiers:
//!
//! - every entity, property, index and standalone relation gets an
//!   `id:uid` pair ([`IdUid`]) that never changes for its lifetime
//! - removed elements have their uids retired so they are never reused
//! - renames are detected through `uid` annotations
//! - the merged model is validated (identifier monotonicity, uid
//!   uniqueness, relation cycles) before anything is written
//!
//! ## Usage
//!
//! ```no_run
//! use entimodel_core::{EntityDraft, FieldDraft, Generator, GeneratorConfig, PropertyType};
//!
//! let schema = vec![EntityDraft::new("Task")
//!     .field(FieldDraft::new("id", PropertyType::Long).unsigned())
//!     .field(FieldDraft::new("text", PropertyType::String).annotate("index")?)];
//!
//! let generator = Generator::new(GeneratorConfig::new().model_path("objectbox-model.json"));
//! let outcome = generator.run(&schema)?;
//! for notice in &outcome.report.notices {
//!     println!("{notice}");
//! }
//! # Ok::<(), entimodel_core::ModelError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod annotation;
mod config;
mod cycles;
mod draft;
mod error;
mod file;
mod finalize;
mod generator;
mod iduid;
mod merge;
mod model;
mod processor;
mod uid;
mod validate;
mod view;

pub use annotation::{Annotation, Annotations, RELATION_KEY_PREFIX};
pub use config::GeneratorConfig;
pub use cycles::check_relation_cycles;
pub use draft::{EntityDraft, FieldDraft};
pub use error::{ModelError, ModelResult, ResultExt};
pub use file::{parse_model, to_json, ModelFile, DEFAULT_MODEL_FILE};
pub use finalize::{build_current_model, finalize_entity};
pub use generator::{BindingEmitter, Generator, NoopEmitter, Outcome};
pub use iduid::{Id, IdUid, Uid};
pub use merge::{merge, MergeReport, Notice};
pub use model::{
    Entity, EntityFlags, HnswDistanceType, HnswFlags, HnswParams, Model, Property, PropertyFlags,
    PropertyType, StandaloneRelation, MIN_MODEL_VERSION, MODEL_VERSION, UID_GENERATION_ATTEMPTS,
};
pub use processor::{
    apply_entity_annotations, apply_property_annotations, Disposition, ENTITY_ANNOTATIONS,
    PROPERTY_ANNOTATIONS,
};
pub use uid::UidGenerator;
pub use view::{MergedModel, MetaTable, NodeKey};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
