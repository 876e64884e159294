//! Relation cycle detection.

use crate::error::{ModelError, ModelResult};
use crate::model::Model;

/// Fails with [`ModelError::RelationCycle`] if the graph of to-one and
/// standalone relations between entities contains a cycle.
///
/// The error path starts at the entity where the search began and lists the
/// relation names leading back into the current search path, e.g.
/// `A.bId.aId` for `A.bId -> B` and `B.aId -> A`.
pub fn check_relation_cycles(model: &Model) -> ModelResult<()> {
    let mut search = Search {
        model,
        on_path: vec![false; model.entities.len()],
        done: vec![false; model.entities.len()],
    };
    for (index, entity) in model.entities.iter().enumerate() {
        if !search.done[index] {
            search.visit(index, entity.name.clone())?;
        }
    }
    Ok(())
}

struct Search<'a> {
    model: &'a Model,
    on_path: Vec<bool>,
    // fully explored without finding a cycle
    done: Vec<bool>,
}

impl Search<'_> {
    fn visit(&mut self, index: usize, path: String) -> ModelResult<()> {
        self.on_path[index] = true;
        let entity = &self.model.entities[index];

        let to_many = entity.relations.iter().map(|r| {
            let target = r
                .target_id
                .and_then(|id| self.model.entities.iter().position(|e| e.id == id));
            (r.name.as_str(), target)
        });
        let to_one = entity
            .properties
            .iter()
            .filter(|p| p.is_relation())
            .map(|p| (p.name.as_str(), self.model.find_entity_by_name(&p.relation_target)));

        let edges: Vec<(&str, Option<usize>)> = to_many.chain(to_one).collect();
        for (name, target) in edges {
            // unresolved targets are reported by validation
            let Some(target) = target else {
                continue;
            };
            let next = format!("{path}.{name}");
            if self.on_path[target] {
                return Err(ModelError::RelationCycle {
                    path: next,
                    target: self.model.entities[target].name.clone(),
                });
            }
            if !self.done[target] {
                self.visit(target, next)?;
            }
        }

        self.on_path[index] = false;
        self.done[index] = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iduid::IdUid;
    use crate::model::{Entity, Property, PropertyType, StandaloneRelation};

    fn entity(id: u32, name: &str) -> Entity {
        let mut e = Entity::new(IdUid::new(id, u64::from(id) * 100));
        e.name = name.into();
        e
    }

    fn link(e: &mut Entity, name: &str, target: &str) {
        let mut p = Property::new(IdUid::new(e.properties.len() as u32 + 1, 0), PropertyType::Relation);
        p.name = name.into();
        p.relation_target = target.into();
        e.properties.push(p);
    }

    fn model(entities: Vec<Entity>) -> Model {
        let mut m = Model::default();
        m.entities = entities;
        m
    }

    #[test]
    fn two_entity_cycle() {
        let mut a = entity(1, "A");
        let mut b = entity(2, "B");
        link(&mut a, "bId", "B");
        link(&mut b, "aId", "A");
        let err = check_relation_cycles(&model(vec![a, b])).unwrap_err();
        let ModelError::RelationCycle { path, target } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(path, "A.bId.aId");
        assert_eq!(target, "A");
    }

    #[test]
    fn self_relation_is_a_cycle() {
        let mut tree = entity(1, "Tree");
        link(&mut tree, "parentId", "Tree");
        let err = check_relation_cycles(&model(vec![tree])).unwrap_err();
        assert_eq!(err.to_string(), "relation cycle detected: Tree.parentId (Tree)");
    }

    #[test]
    fn to_many_edges_count() {
        let mut a = entity(1, "A");
        let b_id = IdUid::new(2, 200);
        let mut rel = StandaloneRelation::new(IdUid::new(1, 999));
        rel.name = "bs".into();
        rel.target_id = Some(b_id);
        a.relations.push(rel);
        let mut b = entity(2, "B");
        link(&mut b, "aId", "A");
        let err = check_relation_cycles(&model(vec![a, b])).unwrap_err();
        assert!(matches!(err, ModelError::RelationCycle { ref path, .. } if path == "A.bs.aId"));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut a = entity(1, "A");
        let mut b = entity(2, "B");
        let mut c = entity(3, "C");
        let d = entity(4, "D");
        link(&mut a, "bId", "B");
        link(&mut a, "cId", "C");
        link(&mut b, "dId", "D");
        link(&mut c, "dId", "D");
        check_relation_cycles(&model(vec![a, b, c, d])).unwrap();
    }

    #[test]
    fn unresolved_targets_are_skipped() {
        let mut a = entity(1, "A");
        link(&mut a, "xId", "Missing");
        check_relation_cycles(&model(vec![a])).unwrap();
    }
}
