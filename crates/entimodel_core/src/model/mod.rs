//! The model database.
//!
//! A [`Model`] owns every entity, property, index registration and
//! standalone relation together with the retired Uid lists. Children are
//! addressed by their position in the owning vectors; the factory and
//! removal methods live on the model so that identifier allocation and
//! retirement always see the whole picture.

mod entity;
mod property;
mod relation;
pub mod types;

pub use entity::Entity;
pub use property::Property;
pub use relation::StandaloneRelation;
pub use types::{
    EntityFlags, HnswDistanceType, HnswFlags, HnswParams, PropertyFlags, PropertyType,
};

use crate::error::{ModelError, ModelResult};
use crate::iduid::{Id, IdUid, Uid};
use crate::uid::UidGenerator;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current version of the model document format.
pub const MODEL_VERSION: u32 = 5;

/// Oldest model document format that can still be read.
pub const MIN_MODEL_VERSION: u32 = 4;

/// Number of candidates tried before uid generation gives up.
pub const UID_GENERATION_ATTEMPTS: u32 = 1000;

pub(crate) const NOTE1: &str =
    "KEEP THIS FILE! Check it into a version control system (VCS) like git.";
pub(crate) const NOTE2: &str =
    "ObjectBox manages crucial IDs for your object model. See docs for details.";
pub(crate) const NOTE3: &str =
    "If you have VCS merge conflicts, you must resolve them according to ObjectBox docs.";

/// All known entities and the identifier bookkeeping of a model file.
///
/// Field order is the key order of the persisted document; don't change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(rename = "_note1", default)]
    pub(crate) note1: String,
    #[serde(rename = "_note2", default)]
    pub(crate) note2: String,
    #[serde(rename = "_note3", default)]
    pub(crate) note3: String,
    /// Entities in schema order.
    pub entities: Vec<Entity>,
    /// Highest entity id ever assigned.
    #[serde(default, with = "crate::iduid::optional")]
    pub last_entity_id: Option<IdUid>,
    /// Highest index id ever assigned.
    #[serde(default, with = "crate::iduid::optional")]
    pub last_index_id: Option<IdUid>,
    /// Highest standalone relation id ever assigned.
    #[serde(default, with = "crate::iduid::optional")]
    pub last_relation_id: Option<IdUid>,
    /// Format version of the document.
    #[serde(default)]
    pub model_version: u32,
    /// Oldest format version a reader must understand.
    #[serde(rename = "modelVersionParserMinimum", default)]
    pub minimum_parser_version: u32,
    /// Uids of removed entities.
    pub retired_entity_uids: Vec<Uid>,
    /// Uids of removed indexes.
    pub retired_index_uids: Vec<Uid>,
    /// Uids of removed properties.
    pub retired_property_uids: Vec<Uid>,
    /// Uids of removed standalone relations.
    #[serde(default)]
    pub retired_relation_uids: Vec<Uid>,
    /// User-controlled document version.
    #[serde(default)]
    pub version: u64,

    #[serde(skip)]
    uids: UidGenerator,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(UidGenerator::default())
    }
}

impl Model {
    /// Creates an empty model at the current format version.
    #[must_use]
    pub fn new(uids: UidGenerator) -> Self {
        Self {
            note1: NOTE1.to_string(),
            note2: NOTE2.to_string(),
            note3: NOTE3.to_string(),
            entities: Vec::new(),
            last_entity_id: None,
            last_index_id: None,
            last_relation_id: None,
            model_version: MODEL_VERSION,
            minimum_parser_version: MODEL_VERSION,
            retired_entity_uids: Vec::new(),
            retired_index_uids: Vec::new(),
            retired_property_uids: Vec::new(),
            retired_relation_uids: Vec::new(),
            version: 1,
            uids,
        }
    }

    /// Replaces the uid source, e.g. with a seeded one after loading.
    pub fn set_uid_generator(&mut self, uids: UidGenerator) {
        self.uids = uids;
    }

    /// Refreshes the explanatory notes to the current text.
    pub(crate) fn fill_missing(&mut self) {
        NOTE1.clone_into(&mut self.note1);
        NOTE2.clone_into(&mut self.note2);
        NOTE3.clone_into(&mut self.note3);
    }

    /// Returns a uid that is not used anywhere in the model, retired ones
    /// included.
    pub fn generate_uid(&mut self) -> ModelResult<Uid> {
        for _ in 0..UID_GENERATION_ATTEMPTS {
            let candidate = self.uids.next_candidate();
            if candidate != 0 && !self.contains_uid(candidate) {
                return Ok(candidate);
            }
        }
        Err(ModelError::UidGenerationExhausted {
            attempts: UID_GENERATION_ATTEMPTS,
        })
    }

    /// Returns true if `uid` is mentioned anywhere in the model.
    #[must_use]
    pub fn contains_uid(&self, uid: Uid) -> bool {
        [self.last_entity_id, self.last_index_id, self.last_relation_id]
            .iter()
            .flatten()
            .any(|id| id.uid() == uid)
            || self.is_retired(uid)
            || self.entities.iter().any(|e| e.contains_uid(uid))
    }

    /// Returns true if `uid` is in any retired list.
    #[must_use]
    pub fn is_retired(&self, uid: Uid) -> bool {
        self.retired_entity_uids.contains(&uid)
            || self.retired_index_uids.contains(&uid)
            || self.retired_property_uids.contains(&uid)
            || self.retired_relation_uids.contains(&uid)
    }

    /// Returns true if any entity has standalone relations.
    #[must_use]
    pub fn has_relations(&self) -> bool {
        self.entities.iter().any(|e| !e.relations.is_empty())
    }

    /// Returns the position of the entity with the given uid.
    #[must_use]
    pub fn find_entity_by_uid(&self, uid: Uid) -> Option<usize> {
        self.entities.iter().position(|e| e.id.uid() == uid)
    }

    /// Returns the position of the entity with the given name, ignoring case.
    #[must_use]
    pub fn find_entity_by_name(&self, name: &str) -> Option<usize> {
        self.entities
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Returns the entity with the given name, ignoring case.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.find_entity_by_name(name).map(|i| &self.entities[i])
    }

    /// Returns the entity with the given local id.
    #[must_use]
    pub fn entity_by_id(&self, id: Id) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id.id() == id)
    }

    /// Appends a new entity with the next entity id and a fresh uid.
    pub fn create_entity(&mut self, name: &str) -> ModelResult<usize> {
        let id = next_id(self.last_entity_id);
        let uid = self.generate_uid()?;
        let mut entity = Entity::new(IdUid::new(id, uid));
        entity.name = name.to_string();
        self.last_entity_id = Some(entity.id);
        debug!(entity = name, id = %entity.id, "created entity");
        self.entities.push(entity);
        Ok(self.entities.len() - 1)
    }

    /// Removes an entity, retiring its uid and the uids of all its children.
    pub fn remove_entity(&mut self, entity: usize) -> ModelResult<Entity> {
        self.check_entity(entity)?;
        while !self.entities[entity].properties.is_empty() {
            self.remove_property(entity, 0)?;
        }
        while !self.entities[entity].relations.is_empty() {
            self.remove_relation(entity, 0)?;
        }
        let removed = self.entities.remove(entity);
        self.retired_entity_uids.push(removed.id.uid());
        debug!(entity = %removed.name, id = %removed.id, "removed entity");
        Ok(removed)
    }

    /// Appends a new property with the entity's next property id and a fresh uid.
    pub fn create_property(
        &mut self,
        entity: usize,
        name: &str,
        property_type: PropertyType,
    ) -> ModelResult<usize> {
        self.check_entity(entity)?;
        let id = next_id(self.entities[entity].last_property_id);
        let uid = self.generate_uid()?;
        let mut property = Property::new(IdUid::new(id, uid), property_type);
        property.name = name.to_string();

        let e = &mut self.entities[entity];
        e.last_property_id = Some(property.id);
        debug!(entity = %e.name, property = name, id = %property.id, "created property");
        e.properties.push(property);
        Ok(e.properties.len() - 1)
    }

    /// Removes a property, retiring its uid and its index uid.
    pub fn remove_property(&mut self, entity: usize, property: usize) -> ModelResult<Property> {
        self.check_property(entity, property)?;
        if self.entities[entity].properties[property].index_id.is_some() {
            self.remove_index(entity, property)?;
        }
        let removed = self.entities[entity].properties.remove(property);
        self.retired_property_uids.push(removed.id.uid());
        debug!(property = %removed.name, id = %removed.id, "removed property");
        Ok(removed)
    }

    /// Allocates the next index id with a fresh uid.
    pub fn create_index(&mut self) -> ModelResult<IdUid> {
        let id = next_id(self.last_index_id);
        let uid = self.generate_uid()?;
        let index = IdUid::new(id, uid);
        self.last_index_id = Some(index);
        debug!(id = %index, "created index");
        Ok(index)
    }

    /// Drops a property's index and retires its uid.
    pub fn remove_index(&mut self, entity: usize, property: usize) -> ModelResult<()> {
        self.check_property(entity, property)?;
        let property = &mut self.entities[entity].properties[property];
        let Some(index) = property.index_id.take() else {
            return Err(ModelError::invalid(format!(
                "property {:?} has no index",
                property.name
            )));
        };
        if index.uid() != 0 {
            self.retired_index_uids.push(index.uid());
        }
        debug!(property = %property.name, id = %index, "removed index");
        Ok(())
    }

    /// Appends a new standalone relation with the next relation id and a
    /// fresh uid.
    pub fn create_relation(&mut self, entity: usize, name: &str) -> ModelResult<usize> {
        self.check_entity(entity)?;
        let id = next_id(self.last_relation_id);
        let uid = self.generate_uid()?;
        let mut relation = StandaloneRelation::new(IdUid::new(id, uid));
        relation.name = name.to_string();
        self.last_relation_id = Some(relation.id);

        let e = &mut self.entities[entity];
        debug!(entity = %e.name, relation = name, id = %relation.id, "created relation");
        e.relations.push(relation);
        Ok(e.relations.len() - 1)
    }

    /// Removes a standalone relation and retires its uid.
    pub fn remove_relation(
        &mut self,
        entity: usize,
        relation: usize,
    ) -> ModelResult<StandaloneRelation> {
        self.check_entity(entity)?;
        if relation >= self.entities[entity].relations.len() {
            return Err(ModelError::invalid(format!(
                "no relation at position {relation}"
            )));
        }
        let removed = self.entities[entity].relations.remove(relation);
        self.retired_relation_uids.push(removed.id.uid());
        debug!(relation = %removed.name, id = %removed.id, "removed relation");
        Ok(removed)
    }

    fn check_entity(&self, entity: usize) -> ModelResult<()> {
        if entity < self.entities.len() {
            Ok(())
        } else {
            Err(ModelError::invalid(format!("no entity at position {entity}")))
        }
    }

    fn check_property(&self, entity: usize, property: usize) -> ModelResult<()> {
        self.check_entity(entity)?;
        if property < self.entities[entity].properties.len() {
            Ok(())
        } else {
            Err(ModelError::invalid(format!("no property at position {property}")))
        }
    }
}

/// Next local id after `last`; ids start at 1.
fn next_id(last: Option<IdUid>) -> Id {
    last.map_or(1, |l| l.id() + 1)
}
