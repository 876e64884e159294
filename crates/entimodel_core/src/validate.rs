//! Model-wide invariants.

use crate::cycles::check_relation_cycles;
use crate::error::{ModelError, ModelResult, ResultExt};
use crate::iduid::{IdUid, Uid};
use crate::model::{Model, MIN_MODEL_VERSION, MODEL_VERSION};
use std::collections::HashMap;

impl Model {
    /// Checks every invariant of the model and reports the first violation.
    ///
    /// Runs the relation cycle check last; relation targets are only bound
    /// by id after a merge.
    pub fn validate(&self) -> ModelResult<()> {
        self.check_version()?;

        for (i, entity) in self.entities.iter().enumerate() {
            entity.validate().at(|| format!("entity {:?}", entity.name))?;
            for other in &self.entities[..i] {
                if other.name.eq_ignore_ascii_case(&entity.name) {
                    return Err(ModelError::DuplicateName {
                        kind: "entity",
                        name: entity.name.clone(),
                    });
                }
                if other.id.id() == entity.id.id() {
                    return Err(ModelError::invalid(format!(
                        "entities {:?} and {:?} share id {}",
                        other.name,
                        entity.name,
                        entity.id.id()
                    )));
                }
            }
            if let Some(last) = entity.last_property_id {
                if !entity.last_property_is_live()
                    && !self.retired_property_uids.contains(&last.uid())
                {
                    return Err(ModelError::monotonicity(format!(
                        "lastPropertyId {last} doesn't match any property"
                    )))
                    .at(|| format!("entity {:?}", entity.name));
                }
            }
        }

        check_last_id(
            "lastEntityId",
            self.last_entity_id,
            self.entities.iter().map(|e| (e.name.as_str(), e.id)),
            &self.retired_entity_uids,
        )?;

        check_last_id(
            "lastIndexId",
            self.last_index_id,
            self.entities.iter().flat_map(|e| {
                e.properties
                    .iter()
                    .filter_map(|p| p.index_id.map(|i| (p.name.as_str(), i)))
            }),
            &self.retired_index_uids,
        )?;

        check_last_id(
            "lastRelationId",
            self.last_relation_id,
            self.entities
                .iter()
                .flat_map(|e| e.relations.iter().map(|r| (r.name.as_str(), r.id))),
            &self.retired_relation_uids,
        )?;

        self.check_relation_targets()?;
        self.check_uid_uniqueness()?;
        check_relation_cycles(self)
    }

    fn check_version(&self) -> ModelResult<()> {
        if self.model_version < MIN_MODEL_VERSION {
            return Err(ModelError::ModelTooOld {
                version: self.model_version,
                minimum: MIN_MODEL_VERSION,
            });
        }
        if self.model_version > MODEL_VERSION
            && (self.minimum_parser_version == 0 || self.minimum_parser_version > MODEL_VERSION)
        {
            return Err(ModelError::ModelTooNew {
                version: self.model_version,
                maximum: MODEL_VERSION,
            });
        }
        Ok(())
    }

    fn check_relation_targets(&self) -> ModelResult<()> {
        for entity in &self.entities {
            for relation in &entity.relations {
                let Some(target) = relation.target_id else {
                    continue;
                };
                if !self.entities.iter().any(|e| e.id == target) {
                    return Err(ModelError::invalid(format!(
                        "target entity {target} not found"
                    )))
                    .at(|| format!("entity {:?} relation {:?}", entity.name, relation.name));
                }
            }
            for property in entity.properties.iter().filter(|p| p.is_relation()) {
                if self.find_entity_by_name(&property.relation_target).is_none() {
                    return Err(ModelError::invalid(format!(
                        "relation target entity {:?} not found",
                        property.relation_target
                    )))
                    .at(|| format!("entity {:?} property {:?}", entity.name, property.name));
                }
            }
        }
        Ok(())
    }

    fn check_uid_uniqueness(&self) -> ModelResult<()> {
        let mut seen: HashMap<Uid, String> = HashMap::new();
        let mut add = |uid: Uid, location: String| -> ModelResult<()> {
            if let Some(previous) = seen.insert(uid, location.clone()) {
                return Err(ModelError::UidCollision {
                    uid,
                    message: format!("{previous} and {location}"),
                });
            }
            Ok(())
        };

        for entity in &self.entities {
            add(entity.id.uid(), format!("entity {:?}", entity.name))?;
            for property in &entity.properties {
                add(
                    property.id.uid(),
                    format!("property {}.{}", entity.name, property.name),
                )?;
                if let Some(index) = property.index_id {
                    add(
                        index.uid(),
                        format!("index of {}.{}", entity.name, property.name),
                    )?;
                }
            }
            for relation in &entity.relations {
                add(
                    relation.id.uid(),
                    format!("relation {}.{}", entity.name, relation.name),
                )?;
            }
        }

        let retired = [
            ("retiredEntityUids", &self.retired_entity_uids),
            ("retiredIndexUids", &self.retired_index_uids),
            ("retiredPropertyUids", &self.retired_property_uids),
            ("retiredRelationUids", &self.retired_relation_uids),
        ];
        for (list, uids) in retired {
            for uid in uids {
                add(*uid, list.to_string())?;
            }
        }
        Ok(())
    }
}

/// Checks that `last` is at least every live id of its scope, matches the
/// element with the same id, and otherwise names a retired uid.
fn check_last_id<'a>(
    what: &str,
    last: Option<IdUid>,
    live: impl Iterator<Item = (&'a str, IdUid)>,
    retired: &[Uid],
) -> ModelResult<()> {
    let live: Vec<_> = live.collect();
    let Some(last) = last else {
        return match live.first() {
            None => Ok(()),
            Some((name, id)) => Err(ModelError::invalid(format!(
                "{what} is undefined while {name:?} has id {id}"
            ))),
        };
    };
    last.validate()
        .map_err(|e| ModelError::invalid(format!("{what}: {e}")))?;

    let mut found = false;
    for (i, (name, id)) in live.iter().enumerate() {
        if id.id() > last.id() {
            return Err(ModelError::monotonicity(format!(
                "{what} {last} is lower than {name:?} {id}"
            )));
        }
        if id.id() == last.id() {
            if id.uid() != last.uid() {
                return Err(ModelError::monotonicity(format!(
                    "{what} {last} doesn't match {name:?} {id}"
                )));
            }
            found = true;
        }
        if let Some((other, _)) = live[..i].iter().find(|(_, o)| o.id() == id.id()) {
            return Err(ModelError::invalid(format!(
                "{other:?} and {name:?} share the id {}",
                id.id()
            )))
            .at(|| what.to_string());
        }
    }

    if !found && !retired.contains(&last.uid()) {
        return Err(ModelError::monotonicity(format!(
            "{what} {last} doesn't match any live or retired element"
        )));
    }
    Ok(())
}
