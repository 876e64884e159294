//! Entities.

use super::property::Property;
use super::relation::StandaloneRelation;
use super::types::EntityFlags;
use crate::error::{ModelError, ModelResult, ResultExt};
use crate::iduid::{IdUid, Uid};
use serde::{Deserialize, Serialize};

/// A persistent class with its properties and standalone relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Model-wide entity id and uid.
    pub id: IdUid,
    /// Highest property id ever assigned in this entity.
    #[serde(default, with = "crate::iduid::optional")]
    pub last_property_id: Option<IdUid>,
    /// Name in the database.
    pub name: String,
    /// Entity flags.
    #[serde(default, skip_serializing_if = "EntityFlags::is_unset")]
    pub flags: EntityFlags,
    /// Properties in declaration order.
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Standalone relations in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<StandaloneRelation>,
    /// Set when the schema asked for this entity's uid.
    #[serde(skip)]
    pub uid_request: bool,
    /// Documentation lines from the schema.
    #[serde(skip)]
    pub comments: Vec<String>,
}

impl Entity {
    /// Creates an unnamed, empty entity.
    #[must_use]
    pub fn new(id: IdUid) -> Self {
        Self {
            id,
            last_property_id: None,
            name: String::new(),
            flags: EntityFlags::empty(),
            properties: Vec::new(),
            relations: Vec::new(),
            uid_request: false,
            comments: Vec::new(),
        }
    }

    /// Returns the position of the property with the given uid.
    #[must_use]
    pub fn find_property_by_uid(&self, uid: Uid) -> Option<usize> {
        self.properties.iter().position(|p| p.id.uid() == uid)
    }

    /// Returns the position of the property with the given name, ignoring case.
    #[must_use]
    pub fn find_property_by_name(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns the property with the given name, ignoring case.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.find_property_by_name(name).map(|i| &self.properties[i])
    }

    /// Returns the position of the relation with the given uid.
    #[must_use]
    pub fn find_relation_by_uid(&self, uid: Uid) -> Option<usize> {
        self.relations.iter().position(|r| r.id.uid() == uid)
    }

    /// Returns the position of the relation with the given name, ignoring case.
    #[must_use]
    pub fn find_relation_by_name(&self, name: &str) -> Option<usize> {
        self.relations
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Returns the ID property.
    #[must_use]
    pub fn id_property(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_id())
    }

    /// Returns true if `uid` is used by the entity or any of its children.
    #[must_use]
    pub fn contains_uid(&self, uid: Uid) -> bool {
        self.id.uid() == uid
            || self.last_property_id.is_some_and(|l| l.uid() == uid)
            || self.properties.iter().any(|p| p.contains_uid(uid))
            || self.relations.iter().any(|r| r.contains_uid(uid))
    }

    /// Checks the entity and its properties; model-wide checks are done by
    /// [`Model::validate`](crate::Model::validate).
    pub fn validate(&self) -> ModelResult<()> {
        self.id.validate()?;
        if self.name.is_empty() {
            return Err(ModelError::invalid("name is undefined"));
        }

        let Some(last) = self.last_property_id else {
            if self.properties.is_empty() {
                return Ok(());
            }
            return Err(ModelError::invalid("lastPropertyId is undefined"));
        };
        last.validate()
            .map_err(|e| ModelError::invalid(format!("lastPropertyId: {e}")))?;

        for (i, property) in self.properties.iter().enumerate() {
            property
                .validate()
                .at(|| format!("property {:?}", property.name))?;

            if property.id.id() > last.id() {
                return Err(ModelError::monotonicity(format!(
                    "property {:?} id {} is higher than lastPropertyId {last}",
                    property.name, property.id
                )));
            }
            if property.id.id() == last.id() && property.id.uid() != last.uid() {
                return Err(ModelError::monotonicity(format!(
                    "lastPropertyId {last} does not match property {:?} {}",
                    property.name, property.id
                )));
            }

            for other in &self.properties[..i] {
                if other.name.eq_ignore_ascii_case(&property.name) {
                    return Err(ModelError::DuplicateName {
                        kind: "property",
                        name: property.name.clone(),
                    });
                }
                if other.id.id() == property.id.id() {
                    return Err(ModelError::invalid(format!(
                        "properties {:?} and {:?} share id {}",
                        other.name,
                        property.name,
                        property.id.id()
                    )));
                }
            }
        }

        let id_count = self.properties.iter().filter(|p| p.is_id()).count();
        match id_count {
            1 => {}
            0 => return Err(ModelError::NoIdProperty),
            n => {
                return Err(ModelError::invalid(format!(
                    "{n} properties are flagged as ID, expected exactly one"
                )))
            }
        }

        for (i, relation) in self.relations.iter().enumerate() {
            relation
                .validate()
                .at(|| format!("relation {:?}", relation.name))?;
            if self.relations[..i]
                .iter()
                .any(|r| r.name.eq_ignore_ascii_case(&relation.name))
            {
                return Err(ModelError::DuplicateName {
                    kind: "relation",
                    name: relation.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Returns true if the last property id belongs to a live property.
    ///
    /// Otherwise the property was removed and its uid must be retired.
    #[must_use]
    pub(crate) fn last_property_is_live(&self) -> bool {
        self.last_property_id
            .is_some_and(|last| self.properties.iter().any(|p| p.id == last))
    }
}
