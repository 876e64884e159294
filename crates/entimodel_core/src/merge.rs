//! Reconciles the model built from the schema with the stored model.
//!
//! The stored model is updated in place: matched elements keep their
//! identifiers, new elements get fresh ones and elements missing from the
//! schema are removed with their uids retired. Elements are matched by uid
//! first and by case-insensitive name second; a stored element can be
//! claimed by one schema element only.
//!
//! The elements of a scope are all resolved before the scope is changed.
//! A failed merge leaves the stored model half updated; callers discard it
//! and never write it back.

use crate::error::{ModelError, ModelResult, ResultExt};
use crate::iduid::Uid;
use crate::model::{Entity, Model, Property, MODEL_VERSION};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// A change made by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A new entity was added.
    EntityAdded {
        /// Entity name.
        entity: String,
    },
    /// A stored entity was not in the schema and was removed.
    EntityRemoved {
        /// Entity name.
        entity: String,
    },
    /// An entity was renamed.
    EntityRenamed {
        /// Previous name.
        from: String,
        /// New name.
        to: String,
    },
    /// A property was added to an existing entity.
    PropertyAdded {
        /// Owning entity.
        entity: String,
        /// Property name.
        property: String,
    },
    /// A property was removed.
    PropertyRemoved {
        /// Owning entity.
        entity: String,
        /// Property name.
        property: String,
    },
    /// A property was renamed.
    PropertyRenamed {
        /// Owning entity.
        entity: String,
        /// Previous name.
        from: String,
        /// New name.
        to: String,
    },
    /// A property got a new uid; its stored data is discarded.
    PropertyReset {
        /// Owning entity.
        entity: String,
        /// Property name.
        property: String,
        /// Retired uid.
        old_uid: Uid,
        /// Uid from the schema.
        new_uid: Uid,
    },
    /// An index was added to an existing property.
    IndexAdded {
        /// Owning entity.
        entity: String,
        /// Property name.
        property: String,
    },
    /// An index was dropped.
    IndexRemoved {
        /// Owning entity.
        entity: String,
        /// Property name.
        property: String,
    },
    /// A standalone relation was added to an existing entity.
    RelationAdded {
        /// Owning entity.
        entity: String,
        /// Relation name.
        relation: String,
    },
    /// A standalone relation was removed.
    RelationRemoved {
        /// Owning entity.
        entity: String,
        /// Relation name.
        relation: String,
    },
    /// A standalone relation was renamed.
    RelationRenamed {
        /// Owning entity.
        entity: String,
        /// Previous name.
        from: String,
        /// New name.
        to: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntityAdded { entity } => write!(f, "added entity {entity}"),
            Self::EntityRemoved { entity } => write!(f, "removed entity {entity}"),
            Self::EntityRenamed { from, to } => write!(f, "renamed entity {from} to {to}"),
            Self::PropertyAdded { entity, property } => {
                write!(f, "added property {entity}.{property}")
            }
            Self::PropertyRemoved { entity, property } => {
                write!(f, "removed property {entity}.{property}")
            }
            Self::PropertyRenamed { entity, from, to } => {
                write!(f, "renamed property {entity}.{from} to {to}")
            }
            Self::PropertyReset {
                entity,
                property,
                old_uid,
                new_uid,
            } => write!(
                f,
                "new uid {new_uid} was specified for property {entity}.{property} - \
                 resetting its data (uid {old_uid} retired)"
            ),
            Self::IndexAdded { entity, property } => {
                write!(f, "added index on {entity}.{property}")
            }
            Self::IndexRemoved { entity, property } => {
                write!(f, "removed index on {entity}.{property}")
            }
            Self::RelationAdded { entity, relation } => {
                write!(f, "added relation {entity}.{relation}")
            }
            Self::RelationRemoved { entity, relation } => {
                write!(f, "removed relation {entity}.{relation}")
            }
            Self::RelationRenamed { entity, from, to } => {
                write!(f, "renamed relation {entity}.{from} to {to}")
            }
        }
    }
}

/// Changes made by a merge, in the order they were made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// The changes.
    pub notices: Vec<Notice>,
}

impl MergeReport {
    /// Returns true if the merge changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    fn push(&mut self, notice: Notice) {
        if let Notice::PropertyReset { .. } = notice {
            warn!("{notice}");
        } else {
            info!("{notice}");
        }
        self.notices.push(notice);
    }
}

/// Stored uids claimed by schema elements, with the claiming names.
struct Claims<'a> {
    kind: &'static str,
    by_uid: HashMap<Uid, &'a str>,
}

impl<'a> Claims<'a> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            by_uid: HashMap::new(),
        }
    }

    fn claim(&mut self, uid: Uid, name: &'a str) -> ModelResult<()> {
        if let Some(other) = self.by_uid.insert(uid, name) {
            return Err(ModelError::ambiguous_rename(format!(
                "{kind} {other:?} and {kind} {name:?} both resolve to the stored {kind} with uid {uid}",
                kind = self.kind
            )));
        }
        Ok(())
    }

    fn contains(&self, uid: Uid) -> bool {
        self.by_uid.contains_key(&uid)
    }
}

/// Uids of the merged entities by lowercase schema name.
type EntityTargets = HashMap<String, Uid>;

/// Merges `current` (built from the schema) into `stored`.
pub fn merge(current: &Model, stored: &mut Model) -> ModelResult<MergeReport> {
    let mut report = MergeReport::default();

    let (matches, claims) = resolve_entities(current, stored)?;

    let mut i = 0;
    while i < stored.entities.len() {
        if claims.contains(stored.entities[i].id.uid()) {
            i += 1;
            continue;
        }
        let removed = stored.remove_entity(i)?;
        report.push(Notice::EntityRemoved {
            entity: removed.name,
        });
    }

    // every entity must exist before relation targets are resolved
    let mut order = Vec::with_capacity(current.entities.len());
    let mut created = Vec::with_capacity(current.entities.len());
    for (entity, matched) in current.entities.iter().zip(&matches) {
        let uid = match matched {
            Some(uid) => *uid,
            None => {
                let index = stored.create_entity(&entity.name)?;
                report.push(Notice::EntityAdded {
                    entity: entity.name.clone(),
                });
                stored.entities[index].id.uid()
            }
        };
        order.push(uid);
        created.push(matched.is_none());
    }

    // relation targets bind to the resolved entity, not to whichever stored
    // entity carries the name while renames are half applied
    let targets: EntityTargets = current
        .entities
        .iter()
        .zip(&order)
        .map(|(entity, uid)| (entity.name.to_ascii_lowercase(), *uid))
        .collect();

    for ((entity, uid), is_new) in current.entities.iter().zip(&order).zip(&created) {
        let index = stored
            .find_entity_by_uid(*uid)
            .ok_or(ModelError::UnknownEntityUid { uid: *uid })?;
        merge_entity(entity, index, stored, *is_new, &targets, &mut report)
            .at(|| format!("entity {:?}", entity.name))?;
    }

    reorder(&mut stored.entities, |e| e.id.uid(), &order);

    if stored.model_version <= MODEL_VERSION {
        stored.model_version = MODEL_VERSION;
        stored.minimum_parser_version = MODEL_VERSION;
    }

    Ok(report)
}

fn resolve_entities<'a>(
    current: &'a Model,
    stored: &Model,
) -> ModelResult<(Vec<Option<Uid>>, Claims<'a>)> {
    let mut claims = Claims::new("entity");
    let mut matches = vec![None; current.entities.len()];

    for (entity, matched) in current.entities.iter().zip(matches.iter_mut()) {
        let uid = entity.id.uid();
        if uid == 0 {
            continue;
        }
        if stored.find_entity_by_uid(uid).is_none() {
            return Err(
                ModelError::UnknownEntityUid { uid }.at(format!("entity {:?}", entity.name))
            );
        }
        claims.claim(uid, &entity.name)?;
        *matched = Some(uid);
    }

    for (entity, matched) in current.entities.iter().zip(matches.iter_mut()) {
        if entity.id.uid() != 0 {
            continue;
        }
        let found = stored
            .find_entity_by_name(&entity.name)
            .map(|i| stored.entities[i].id.uid());

        if entity.uid_request {
            return Err(ModelError::UidRequested {
                element: format!("entity {}", entity.name),
                message: match found {
                    Some(uid) => format!("model entity UID = {uid}"),
                    None => "entity not found in the model".to_string(),
                },
            });
        }

        if let Some(uid) = found {
            claims.claim(uid, &entity.name)?;
            *matched = Some(uid);
        }
    }

    Ok((matches, claims))
}

/// How a schema property maps onto the stored entity.
#[derive(Debug, Clone, Copy)]
enum PropertyMatch {
    Existing(Uid),
    Reset { old: Uid, new: Uid },
    New,
}

impl PropertyMatch {
    fn stored_uid(self) -> Option<Uid> {
        match self {
            Self::Existing(uid) | Self::Reset { old: uid, .. } => Some(uid),
            Self::New => None,
        }
    }
}

fn resolve_properties(
    current: &Entity,
    stored: &mut Model,
    entity: usize,
) -> ModelResult<Vec<PropertyMatch>> {
    let mut claims = Claims::new("property");
    let mut matches = vec![PropertyMatch::New; current.properties.len()];

    for (property, matched) in current.properties.iter().zip(matches.iter_mut()) {
        let uid = property.id.uid();
        if uid == 0 {
            continue;
        }
        let path = || format!("property {:?}", property.name);
        let stored_entity = &stored.entities[entity];

        if stored_entity.find_property_by_uid(uid).is_some() {
            claims.claim(uid, &property.name)?;
            *matched = PropertyMatch::Existing(uid);
            continue;
        }

        // a new uid on a known name resets the property's data
        let Some(index) = stored_entity.find_property_by_name(&property.name) else {
            return Err(ModelError::UnknownPropertyUid {
                entity: stored_entity.name.clone(),
                uid,
            }
            .at(path()));
        };
        if stored.contains_uid(uid) {
            return Err(ModelError::UidCollision {
                uid,
                message: "the new uid of a reset property must not be used anywhere in the model"
                    .to_string(),
            }
            .at(path()));
        }
        let old = stored_entity.properties[index].id.uid();
        claims.claim(old, &property.name)?;
        *matched = PropertyMatch::Reset { old, new: uid };
    }

    for (property, matched) in current.properties.iter().zip(matches.iter_mut()) {
        if property.id.uid() != 0 {
            continue;
        }
        let stored_entity = &stored.entities[entity];
        let found = stored_entity
            .find_property_by_name(&property.name)
            .map(|i| stored_entity.properties[i].id.uid());

        if property.uid_request {
            let element = format!("property {}.{}", current.name, property.name);
            let Some(uid) = found else {
                return Err(ModelError::UidRequested {
                    element,
                    message: "the property isn't present in the persisted model".to_string(),
                });
            };
            let suggestion = stored.generate_uid()?;
            return Err(ModelError::UidRequested {
                element,
                message: format!(
                    "[rename] apply the current UID {uid}, [change/reset] apply a new UID {suggestion}"
                ),
            });
        }

        if let Some(uid) = found {
            claims.claim(uid, &property.name)?;
            *matched = PropertyMatch::Existing(uid);
        }
    }

    Ok(matches)
}

fn merge_entity(
    current: &Entity,
    entity: usize,
    stored: &mut Model,
    is_new: bool,
    targets: &EntityTargets,
    report: &mut MergeReport,
) -> ModelResult<()> {
    {
        let target = &mut stored.entities[entity];
        if target.name != current.name {
            report.push(Notice::EntityRenamed {
                from: std::mem::replace(&mut target.name, current.name.clone()),
                to: current.name.clone(),
            });
        }
        target.flags = current.flags;
        target.comments.clone_from(&current.comments);
        target.uid_request = false;
    }

    merge_properties(current, entity, stored, is_new, report)?;
    merge_relations(current, entity, stored, is_new, targets, report)
}

fn merge_properties(
    current: &Entity,
    entity: usize,
    stored: &mut Model,
    is_new: bool,
    report: &mut MergeReport,
) -> ModelResult<()> {
    let matches = resolve_properties(current, stored, entity)?;

    let mut i = 0;
    while i < stored.entities[entity].properties.len() {
        let uid = stored.entities[entity].properties[i].id.uid();
        if matches.iter().any(|m| m.stored_uid() == Some(uid)) {
            i += 1;
            continue;
        }
        let removed = stored.remove_property(entity, i)?;
        report.push(Notice::PropertyRemoved {
            entity: current.name.clone(),
            property: removed.name,
        });
    }

    let mut order = Vec::with_capacity(current.properties.len());
    for (property, matched) in current.properties.iter().zip(matches) {
        let path = || format!("property {:?}", property.name);
        let (index, quiet) = match matched {
            PropertyMatch::Existing(uid) => (find_property(stored, entity, uid).at(path)?, is_new),
            PropertyMatch::Reset { old, new } => {
                let index = find_property(stored, entity, old).at(path)?;
                reset_property(stored, entity, index, new);
                report.push(Notice::PropertyReset {
                    entity: current.name.clone(),
                    property: property.name.clone(),
                    old_uid: old,
                    new_uid: new,
                });
                (index, is_new)
            }
            PropertyMatch::New => {
                let index =
                    stored.create_property(entity, &property.name, property.property_type)?;
                if !is_new {
                    report.push(Notice::PropertyAdded {
                        entity: current.name.clone(),
                        property: property.name.clone(),
                    });
                }
                (index, true)
            }
        };

        merge_property(current, property, entity, index, stored, quiet, report).at(path)?;
        order.push(stored.entities[entity].properties[index].id.uid());
    }

    reorder(
        &mut stored.entities[entity].properties,
        |p| p.id.uid(),
        &order,
    );
    Ok(())
}

fn find_property(stored: &Model, entity: usize, uid: Uid) -> ModelResult<usize> {
    let target = &stored.entities[entity];
    target
        .find_property_by_uid(uid)
        .ok_or_else(|| ModelError::UnknownPropertyUid {
            entity: target.name.clone(),
            uid,
        })
}

fn reset_property(stored: &mut Model, entity: usize, property: usize, uid: Uid) {
    let target = &mut stored.entities[entity];
    let old = target.properties[property].id;
    let new = old.with_uid(uid);
    target.properties[property].id = new;
    if target.last_property_id == Some(old) {
        target.last_property_id = Some(new);
    }
    stored.retired_property_uids.push(old.uid());
}

fn merge_property(
    current_entity: &Entity,
    current: &Property,
    entity: usize,
    property: usize,
    stored: &mut Model,
    quiet: bool,
    report: &mut MergeReport,
) -> ModelResult<()> {
    let wants_index = current.index_id.is_some();
    let has_index = stored.entities[entity].properties[property].index_id.is_some();

    if has_index && !wants_index {
        stored.remove_index(entity, property)?;
        if !quiet {
            report.push(Notice::IndexRemoved {
                entity: current_entity.name.clone(),
                property: current.name.clone(),
            });
        }
    } else if wants_index && !has_index {
        let index = stored.create_index()?;
        stored.entities[entity].properties[property].index_id = Some(index);
        if !quiet {
            report.push(Notice::IndexAdded {
                entity: current_entity.name.clone(),
                property: current.name.clone(),
            });
        }
    }

    let target = &mut stored.entities[entity].properties[property];
    if target.name != current.name {
        report.push(Notice::PropertyRenamed {
            entity: current_entity.name.clone(),
            from: std::mem::replace(&mut target.name, current.name.clone()),
            to: current.name.clone(),
        });
    }
    target.property_type = current.property_type;
    target.flags = current.flags;
    target.relation_target.clone_from(&current.relation_target);
    target.hnsw.clone_from(&current.hnsw);
    target.optional.clone_from(&current.optional);
    target.uid_request = false;
    Ok(())
}

fn merge_relations(
    current: &Entity,
    entity: usize,
    stored: &mut Model,
    is_new: bool,
    targets: &EntityTargets,
    report: &mut MergeReport,
) -> ModelResult<()> {
    let mut claims = Claims::new("relation");
    let mut matches: Vec<Option<Uid>> = vec![None; current.relations.len()];

    for (relation, matched) in current.relations.iter().zip(matches.iter_mut()) {
        let uid = relation.id.uid();
        if uid == 0 {
            continue;
        }
        let stored_entity = &stored.entities[entity];
        if stored_entity.find_relation_by_uid(uid).is_none() {
            return Err(ModelError::UnknownRelationUid {
                entity: stored_entity.name.clone(),
                uid,
            }
            .at(format!("relation {:?}", relation.name)));
        }
        claims.claim(uid, &relation.name)?;
        *matched = Some(uid);
    }

    for (relation, matched) in current.relations.iter().zip(matches.iter_mut()) {
        if relation.id.uid() != 0 {
            continue;
        }
        let stored_entity = &stored.entities[entity];
        let found = stored_entity
            .find_relation_by_name(&relation.name)
            .map(|i| stored_entity.relations[i].id.uid());

        if relation.uid_request {
            return Err(ModelError::UidRequested {
                element: format!("relation {}.{}", current.name, relation.name),
                message: match found {
                    Some(uid) => format!("model relation UID = {uid}"),
                    None => "relation not found in the model".to_string(),
                },
            });
        }
        if let Some(uid) = found {
            claims.claim(uid, &relation.name)?;
            *matched = Some(uid);
        }
    }

    let mut i = 0;
    while i < stored.entities[entity].relations.len() {
        if claims.contains(stored.entities[entity].relations[i].id.uid()) {
            i += 1;
            continue;
        }
        let removed = stored.remove_relation(entity, i)?;
        report.push(Notice::RelationRemoved {
            entity: current.name.clone(),
            relation: removed.name,
        });
    }

    let mut order = Vec::with_capacity(current.relations.len());
    for (relation, matched) in current.relations.iter().zip(matches) {
        let path = || format!("relation {:?}", relation.name);
        let index = match matched {
            Some(uid) => stored.entities[entity]
                .find_relation_by_uid(uid)
                .ok_or_else(|| ModelError::UnknownRelationUid {
                    entity: current.name.clone(),
                    uid,
                })
                .at(path)?,
            None => {
                let index = stored.create_relation(entity, &relation.name)?;
                if !is_new {
                    report.push(Notice::RelationAdded {
                        entity: current.name.clone(),
                        relation: relation.name.clone(),
                    });
                }
                index
            }
        };

        let target_id = targets
            .get(&relation.target.to_ascii_lowercase())
            .and_then(|uid| stored.find_entity_by_uid(*uid))
            .map(|i| stored.entities[i].id)
            .ok_or_else(|| {
                ModelError::invalid(format!("target entity {:?} not found", relation.target))
            })
            .at(path)?;

        let target = &mut stored.entities[entity].relations[index];
        if target.name != relation.name {
            report.push(Notice::RelationRenamed {
                entity: current.name.clone(),
                from: std::mem::replace(&mut target.name, relation.name.clone()),
                to: relation.name.clone(),
            });
        }
        target.target.clone_from(&relation.target);
        target.target_id = Some(target_id);
        target.uid_request = false;
        order.push(target.id.uid());
    }

    reorder(&mut stored.entities[entity].relations, |r| r.id.uid(), &order);
    Ok(())
}

/// Sorts `items` into the order of `order`; unknown items go last.
fn reorder<T>(items: &mut [T], key: impl Fn(&T) -> Uid, order: &[Uid]) {
    items.sort_by_key(|item| {
        let uid = key(item);
        order.iter().position(|u| *u == uid).unwrap_or(usize::MAX)
    });
}
