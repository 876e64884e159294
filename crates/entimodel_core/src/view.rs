//! Read-only access to the merged model for binding emitters.

use crate::iduid::{IdUid, Uid};
use crate::model::{Entity, Model, Property, StandaloneRelation};
use std::collections::HashMap;

/// The merged and validated model as seen by emitters.
///
/// Identifiers are final at this point. Relation targets are resolved by id
/// for standalone relations and by name for to-one properties.
#[derive(Debug, Clone, Copy)]
pub struct MergedModel<'a> {
    model: &'a Model,
}

impl<'a> MergedModel<'a> {
    /// Wraps a merged model.
    #[must_use]
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Returns the underlying model.
    #[must_use]
    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// Entities in schema order.
    #[must_use]
    pub fn entities(&self) -> &'a [Entity] {
        &self.model.entities
    }

    /// Looks up an entity by name, ignoring case.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&'a Entity> {
        self.model.entity(name)
    }

    /// Returns the target entity of a standalone relation.
    #[must_use]
    pub fn relation_target(&self, relation: &StandaloneRelation) -> Option<&'a Entity> {
        let target = relation.target_id?;
        self.model.entities.iter().find(|e| e.id == target)
    }

    /// Returns the target entity of a to-one relation property.
    #[must_use]
    pub fn property_target(&self, property: &Property) -> Option<&'a Entity> {
        if property.is_relation() {
            self.model.entity(&property.relation_target)
        } else {
            None
        }
    }

    /// Highest entity id ever assigned.
    #[must_use]
    pub fn last_entity_id(&self) -> Option<IdUid> {
        self.model.last_entity_id
    }

    /// Highest index id ever assigned.
    #[must_use]
    pub fn last_index_id(&self) -> Option<IdUid> {
        self.model.last_index_id
    }

    /// Highest standalone relation id ever assigned.
    #[must_use]
    pub fn last_relation_id(&self) -> Option<IdUid> {
        self.model.last_relation_id
    }
}

/// Identifies a node of the merged model independent of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// An entity by uid.
    Entity(Uid),
    /// A property by uid.
    Property(Uid),
    /// A standalone relation by uid.
    Relation(Uid),
}

impl From<&Entity> for NodeKey {
    fn from(entity: &Entity) -> Self {
        Self::Entity(entity.id.uid())
    }
}

impl From<&Property> for NodeKey {
    fn from(property: &Property) -> Self {
        Self::Property(property.id.uid())
    }
}

impl From<&StandaloneRelation> for NodeKey {
    fn from(relation: &StandaloneRelation) -> Self {
        Self::Relation(relation.id.uid())
    }
}

/// Side table an emitter keeps for its own derived per-node data.
#[derive(Debug, Clone)]
pub struct MetaTable<T> {
    entries: HashMap<NodeKey, T>,
}

impl<T> Default for MetaTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> MetaTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` for a node, returning the previous value.
    pub fn insert(&mut self, key: impl Into<NodeKey>, value: T) -> Option<T> {
        self.entries.insert(key.into(), value)
    }

    /// Returns the value stored for a node.
    #[must_use]
    pub fn get(&self, key: impl Into<NodeKey>) -> Option<&T> {
        self.entries.get(&key.into())
    }

    /// Returns the value stored for a node mutably.
    pub fn get_mut(&mut self, key: impl Into<NodeKey>) -> Option<&mut T> {
        self.entries.get_mut(&key.into())
    }

    /// Removes the value stored for a node.
    pub fn remove(&mut self, key: impl Into<NodeKey>) -> Option<T> {
        self.entries.remove(&key.into())
    }

    /// Number of nodes with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &T)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyFlags, PropertyType};
    use crate::uid::UidGenerator;

    fn model() -> Model {
        let mut m = Model::new(UidGenerator::from_seed(5));
        let user = m.create_entity("User").unwrap();
        let id = m.create_property(user, "id", PropertyType::Long).unwrap();
        m.entities[user].properties[id].add_flags(PropertyFlags::ID);

        let post = m.create_entity("Post").unwrap();
        let id = m.create_property(post, "id", PropertyType::Long).unwrap();
        m.entities[post].properties[id].add_flags(PropertyFlags::ID);
        let author = m.create_property(post, "authorId", PropertyType::Relation).unwrap();
        m.entities[post].properties[author].relation_target = "User".into();
        let likes = m.create_relation(post, "likedBy").unwrap();
        m.entities[post].relations[likes].target_id = Some(m.entities[user].id);
        m
    }

    #[test]
    fn targets_resolve() {
        let m = model();
        let view = MergedModel::new(&m);
        let post = view.entity("post").unwrap();

        let author = post.property("authorId").unwrap();
        assert_eq!(view.property_target(author).unwrap().name, "User");
        assert!(view.property_target(post.id_property().unwrap()).is_none());
        assert_eq!(view.relation_target(&post.relations[0]).unwrap().name, "User");
        assert_eq!(view.last_entity_id(), Some(post.id));
        assert_eq!(view.entities().len(), 2);
    }

    #[test]
    fn meta_table_keys_by_uid() {
        let m = model();
        let mut table = MetaTable::new();
        for entity in &m.entities {
            table.insert(entity, entity.name.to_lowercase());
            for property in &entity.properties {
                table.insert(property, format!("{}_{}", entity.name, property.name));
            }
        }
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(&m.entities[1]).map(String::as_str), Some("post"));

        let author = m.entities[1].property("authorId").unwrap();
        table.get_mut(author).unwrap().push('!');
        assert_eq!(table.remove(author).as_deref(), Some("Post_authorId!"));
        assert!(table.get(&m.entities[1].relations[0]).is_none());
    }
}
