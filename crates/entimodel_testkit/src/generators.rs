//! Property-based test generators using proptest.
//!
//! Schemas are generated from small name pools so that consecutive schemas
//! overlap: entities and fields appear, disappear and come back between
//! generator runs. Relations only point at entities declared earlier, which
//! keeps generated schemas free of cycles; use
//! [`cyclic_schema_strategy`] for the opposite.

use crate::fixtures::{entity, relation_ring};
use entimodel_core::{EntityDraft, FieldDraft, PropertyType};
use proptest::prelude::*;
use proptest::sample::Index;

/// Entity names schemas are drawn from.
pub const ENTITY_NAMES: &[&str] = &["Task", "Tag", "Note", "User", "Post", "Order"];

/// Field names entities are drawn from, in declaration order.
pub const FIELD_NAMES: &[&str] = &["title", "count", "score", "done", "created", "body"];

/// Scalar types generated fields may have.
pub const FIELD_TYPES: &[PropertyType] = &[
    PropertyType::Bool,
    PropertyType::Int,
    PropertyType::Long,
    PropertyType::Double,
    PropertyType::String,
];

/// Annotation names accepted by [`annotation_text_strategy`] output.
pub const ANNOTATION_NAMES: &[&str] =
    &["id", "index", "name", "optional", "relation", "uid", "unique"];

/// A generated schema.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    /// Entities in declaration order.
    pub entities: Vec<EntitySpec>,
}

/// A generated entity.
#[derive(Debug, Clone)]
pub struct EntitySpec {
    /// Entity name.
    pub name: String,
    /// Scalar fields, besides the implicit `id`.
    pub fields: Vec<FieldSpec>,
    /// Target of a to-one relation field, if any.
    pub link: Option<String>,
    /// Targets of standalone relations.
    pub relations: Vec<String>,
}

/// A generated scalar field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Field type.
    pub property_type: PropertyType,
    /// Whether the field carries an `index` annotation.
    pub indexed: bool,
}

impl SchemaSpec {
    /// Converts the schema into drafts for the generator.
    pub fn to_drafts(&self) -> Vec<EntityDraft> {
        self.entities.iter().map(EntitySpec::to_draft).collect()
    }

    /// Converts the schema into drafts where entity `from` is called `to`.
    /// Relations pointing at it use the new name, while generated field and
    /// relation names stay as they were.
    pub fn to_drafts_renaming(&self, from: &str, to: &str) -> Vec<EntityDraft> {
        let rename = |name: &str| if name == from { to } else { name }.to_string();
        self.entities.iter().map(|e| e.draft_named(&rename)).collect()
    }
}

impl EntitySpec {
    /// Converts the entity into a draft.
    pub fn to_draft(&self) -> EntityDraft {
        self.draft_named(&|name| name.to_string())
    }

    fn draft_named(&self, rename: &dyn Fn(&str) -> String) -> EntityDraft {
        let mut draft = entity(&rename(&self.name));
        for field in &self.fields {
            let mut f = FieldDraft::new(&field.name, field.property_type);
            if field.indexed {
                f = f.annotate("index").expect("Invalid index annotation");
            }
            draft = draft.field(f);
        }
        if let Some(target) = &self.link {
            draft = draft.field(
                FieldDraft::new(format!("{}Id", target.to_lowercase()), PropertyType::Long)
                    .unsigned()
                    .annotate(&format!("relation={}", rename(target)))
                    .expect("Invalid relation annotation"),
            );
        }
        for (i, target) in self.relations.iter().enumerate() {
            draft = draft
                .annotate(&format!(
                    "relation(name={}{i},to={})",
                    target.to_lowercase(),
                    rename(target)
                ))
                .expect("Invalid relation annotation");
        }
        draft
    }
}

fn fields_strategy() -> impl Strategy<Value = Vec<FieldSpec>> {
    (
        prop::sample::subsequence(FIELD_NAMES.to_vec(), 0..=FIELD_NAMES.len()),
        prop::collection::vec(
            (prop::sample::select(FIELD_TYPES.to_vec()), prop::bool::weighted(0.3)),
            FIELD_NAMES.len(),
        ),
    )
        .prop_map(|(names, kinds)| {
            names
                .into_iter()
                .zip(kinds)
                .map(|(name, (property_type, indexed))| FieldSpec {
                    name: name.to_string(),
                    property_type,
                    indexed,
                })
                .collect()
        })
}

type EntityParts = (Vec<FieldSpec>, Option<Index>, Vec<Index>);

fn entity_parts_strategy() -> impl Strategy<Value = EntityParts> {
    (
        fields_strategy(),
        prop::option::weighted(0.3, any::<Index>()),
        prop::collection::vec(any::<Index>(), 0..3),
    )
}

/// Strategy for generating acyclic schemas.
pub fn schema_strategy() -> impl Strategy<Value = SchemaSpec> {
    prop::sample::subsequence(ENTITY_NAMES.to_vec(), 0..=ENTITY_NAMES.len())
        .prop_shuffle()
        .prop_flat_map(|names| {
            let n = names.len();
            (Just(names), prop::collection::vec(entity_parts_strategy(), n))
        })
        .prop_map(|(names, parts)| {
            let entities = names
                .iter()
                .zip(parts)
                .enumerate()
                .map(|(i, (name, (fields, link, relations)))| {
                    // only entities declared earlier may be targets
                    let earlier = &names[..i];
                    let pick = |index: &Index| earlier[index.index(earlier.len())].to_string();
                    EntitySpec {
                        name: name.to_string(),
                        fields,
                        link: link.filter(|_| i > 0).map(|l| pick(&l)),
                        relations: if i > 0 {
                            relations.iter().map(pick).collect()
                        } else {
                            Vec::new()
                        },
                    }
                })
                .collect();
            SchemaSpec { entities }
        })
}

/// Strategy for generating a sequence of schemas for consecutive runs.
pub fn evolution_strategy(max_runs: usize) -> impl Strategy<Value = Vec<SchemaSpec>> {
    prop::collection::vec(schema_strategy(), 2..=max_runs.max(2))
}

/// Strategy for generating schemas whose to-one relations form a ring.
pub fn cyclic_schema_strategy() -> impl Strategy<Value = Vec<EntityDraft>> {
    prop::sample::subsequence(ENTITY_NAMES.to_vec(), 1..=4)
        .prop_shuffle()
        .prop_map(|names| relation_ring(&names))
}

/// Strategy for generating annotation tag strings.
///
/// Values are always quoted in the output so they may contain separators.
pub fn annotation_text_strategy() -> impl Strategy<Value = String> {
    let value = prop::string::string_regex("[a-zA-Z0-9_. :=()-]{1,10}").expect("Invalid regex");
    (
        prop::option::of(value),
        prop::option::of(prop_oneof![Just(String::new()), "[1-9][0-9]{0,17}"]),
        prop::option::of(prop_oneof![
            Just(String::new()),
            Just("hash".to_string()),
            Just("value".to_string())
        ]),
        prop::option::of(any::<bool>()),
        any::<bool>(),
        prop::collection::vec(("[a-z]{1,8}", "[A-Z][a-z]{0,8}"), 0..3),
    )
        .prop_map(|(name, uid, index, id, unique, relations)| {
            let mut items = Vec::new();
            if let Some(name) = name {
                items.push(format!("name=\"{name}\""));
            }
            if let Some(uid) = uid {
                items.push(if uid.is_empty() {
                    "uid".to_string()
                } else {
                    format!("uid={uid}")
                });
            }
            if let Some(index) = index {
                items.push(if index.is_empty() {
                    "index".to_string()
                } else {
                    format!("index={index}")
                });
            }
            match id {
                Some(true) => items.push("id(assignable)".to_string()),
                Some(false) => items.push("id".to_string()),
                None => {}
            }
            if unique {
                items.push("unique".to_string());
            }
            for (i, (relation, target)) in relations.into_iter().enumerate() {
                items.push(format!("relation(name={relation}{i}, to={target})"));
            }
            items.join(", ")
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 256,
        }
    }
}

impl PropTestConfig {
    /// Converts into a proptest configuration.
    pub fn to_proptest(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);
        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}
