//! Builds the current model from schema drafts and finalizes it.

use crate::draft::EntityDraft;
use crate::error::{ModelError, ModelResult, ResultExt};
use crate::iduid::IdUid;
use crate::model::{Entity, Model, Property, PropertyFlags, PropertyType};
use crate::processor::{apply_entity_annotations, apply_property_annotations, Disposition};
use crate::uid::UidGenerator;
use tracing::debug;

/// Applies annotations to every draft and returns the resulting model.
///
/// Identifiers in the returned model are unassigned (`0:0`) unless a `uid`
/// annotation set the uid; the merge resolves them against the stored model.
pub fn build_current_model(
    drafts: &[EntityDraft],
    id_types: &[PropertyType],
) -> ModelResult<Model> {
    let mut model = Model::new(UidGenerator::from_seed(0));

    for draft in drafts {
        let Some(entity) = build_entity(draft, id_types).at(|| format!("entity {:?}", draft.name))?
        else {
            debug!(entity = %draft.name, "skipping transient entity");
            continue;
        };

        if model.find_entity_by_name(&entity.name).is_some() {
            return Err(ModelError::DuplicateName {
                kind: "entity",
                name: entity.name,
            });
        }
        model.entities.push(entity);
    }

    Ok(model)
}

fn build_entity(draft: &EntityDraft, id_types: &[PropertyType]) -> ModelResult<Option<Entity>> {
    let mut entity = Entity::new(IdUid::ZERO);
    entity.name.clone_from(&draft.name);
    entity.comments.clone_from(&draft.documentation_lines);

    if apply_entity_annotations(&mut entity, &draft.annotations)? == Disposition::Skip {
        return Ok(None);
    }

    for field in &draft.fields {
        let path = || format!("property {:?}", field.name);
        let mut property = Property::new(IdUid::ZERO, field.property_type().at(path)?);
        property.name.clone_from(&field.name);
        if field.unsigned {
            property.add_flags(PropertyFlags::UNSIGNED);
        }
        if apply_property_annotations(&mut property, &field.annotations).at(path)?
            == Disposition::Skip
        {
            continue;
        }
        entity.properties.push(property);
    }

    finalize_entity(&mut entity, id_types)?;
    Ok(Some(entity))
}

/// Selects and normalizes the ID property and checks names within the entity.
pub fn finalize_entity(entity: &mut Entity, id_types: &[PropertyType]) -> ModelResult<()> {
    let marked: Vec<usize> = entity
        .properties
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_id())
        .map(|(i, _)| i)
        .collect();

    let id = match marked.as_slice() {
        [id] => *id,
        [] => autoselect_id(entity, id_types)?,
        [first, second, ..] => {
            return Err(ModelError::invalid(format!(
                "multiple properties marked as ID: {} and {}",
                entity.properties[*first].name, entity.properties[*second].name
            )))
        }
    };

    // after ID selection, so an `id`/`Id` pair is reported as ambiguous
    for (i, property) in entity.properties.iter().enumerate() {
        if entity.properties[..i]
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&property.name))
        {
            return Err(ModelError::DuplicateName {
                kind: "property",
                name: property.name.clone(),
            });
        }
    }
    for (i, relation) in entity.relations.iter().enumerate() {
        if entity.relations[..i]
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(&relation.name))
        {
            return Err(ModelError::DuplicateName {
                kind: "relation",
                name: relation.name.clone(),
            });
        }
    }

    let property = &mut entity.properties[id];
    if !property.has_valid_id_type(id_types) {
        return Err(ModelError::type_mismatch(format!(
            "invalid type on property marked as ID: {}",
            property.property_type
        ))
        .at(format!("property {:?}", property.name)));
    }
    property.add_flags(PropertyFlags::ID);
    property.flags.remove(PropertyFlags::UNSIGNED);
    property.property_type = PropertyType::Long;
    Ok(())
}

fn autoselect_id(entity: &Entity, id_types: &[PropertyType]) -> ModelResult<usize> {
    let mut found: Option<usize> = None;
    for (i, property) in entity.properties.iter().enumerate() {
        if !property.name.eq_ignore_ascii_case("id") || !property.has_valid_id_type(id_types) {
            continue;
        }
        if let Some(first) = found {
            return Err(ModelError::AmbiguousIdAutoselect {
                first: entity.properties[first].name.clone(),
                second: property.name.clone(),
            });
        }
        found = Some(i);
    }
    let id = found.ok_or(ModelError::NoIdProperty)?;
    debug!(entity = %entity.name, property = %entity.properties[id].name, "selected ID property");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::FieldDraft;

    const ID_TYPES: &[PropertyType] = &[PropertyType::Long, PropertyType::String];

    fn task() -> EntityDraft {
        EntityDraft::new("Task")
            .field(FieldDraft::new("id", PropertyType::Long).unsigned())
            .field(FieldDraft::new("text", PropertyType::String))
    }

    #[test]
    fn id_is_autoselected_and_normalized() {
        let model = build_current_model(&[task()], ID_TYPES).unwrap();
        let id = model.entities[0].id_property().unwrap();
        assert_eq!(id.name, "id");
        assert_eq!(id.flags, PropertyFlags::ID);
        assert_eq!(id.property_type, PropertyType::Long);
        assert!(model.entities[0].id.is_zero());
    }

    #[test]
    fn string_id_is_stored_as_long() {
        let draft = EntityDraft::new("Doc").field(FieldDraft::new("ID", PropertyType::String));
        let model = build_current_model(&[draft], ID_TYPES).unwrap();
        assert_eq!(model.entities[0].properties[0].property_type, PropertyType::Long);
    }

    #[test]
    fn no_id_property() {
        let draft = EntityDraft::new("Doc").field(FieldDraft::new("key", PropertyType::Long));
        let err = build_current_model(&[draft], ID_TYPES).unwrap_err();
        assert!(matches!(err.root(), ModelError::NoIdProperty));
        assert!(err.to_string().starts_with("entity \"Doc\": "));
    }

    #[test]
    fn ambiguous_id() {
        let mut entity = Entity::new(IdUid::ZERO);
        entity.name = "Doc".into();
        for name in ["id", "Id"] {
            let mut p = Property::new(IdUid::ZERO, PropertyType::Long);
            p.name = name.into();
            entity.properties.push(p);
        }
        let err = autoselect_id(&entity, ID_TYPES).unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousIdAutoselect { .. }));
    }

    #[test]
    fn id_pair_differing_in_case_is_ambiguous() {
        let draft = EntityDraft::new("Doc")
            .field(FieldDraft::new("id", PropertyType::Long))
            .field(FieldDraft::new("Id", PropertyType::Long));
        let err = build_current_model(&[draft], ID_TYPES).unwrap_err();
        assert!(matches!(
            err.root(),
            ModelError::AmbiguousIdAutoselect { first, second } if first == "id" && second == "Id"
        ));
    }

    #[test]
    fn duplicate_names_after_explicit_id() {
        let draft = EntityDraft::new("Doc")
            .field(FieldDraft::new("key", PropertyType::Long).annotate("id").unwrap())
            .field(FieldDraft::new("title", PropertyType::String))
            .field(FieldDraft::new("Title", PropertyType::String));
        let err = build_current_model(&[draft], ID_TYPES).unwrap_err();
        assert!(matches!(err.root(), ModelError::DuplicateName { kind: "property", .. }));
    }

    #[test]
    fn explicit_id_wins_over_name() {
        let draft = EntityDraft::new("Doc")
            .field(FieldDraft::new("id", PropertyType::Long))
            .field(FieldDraft::new("key", PropertyType::Long).annotate("id").unwrap());
        let model = build_current_model(&[draft], ID_TYPES).unwrap();
        assert_eq!(model.entities[0].id_property().unwrap().name, "key");
    }

    #[test]
    fn explicit_id_type_is_checked() {
        let draft = EntityDraft::new("Doc")
            .field(FieldDraft::new("key", PropertyType::Double).annotate("id").unwrap());
        let err = build_current_model(&[draft], ID_TYPES).unwrap_err();
        assert!(matches!(err.root(), ModelError::TypeMismatch { .. }));
    }

    #[test]
    fn duplicate_names_ignore_case() {
        let mut other = task();
        other.name = "TASK".into();
        let err = build_current_model(&[task(), other], ID_TYPES).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { kind: "entity", .. }));

        let draft = task().field(FieldDraft::new("Text", PropertyType::String));
        let err = build_current_model(&[draft], ID_TYPES).unwrap_err();
        assert!(matches!(err.root(), ModelError::DuplicateName { kind: "property", .. }));
    }

    #[test]
    fn durable_names_are_compared() {
        let draft = task().field(
            FieldDraft::new("content", PropertyType::String)
                .annotate("name=text")
                .unwrap(),
        );
        assert!(build_current_model(&[draft], ID_TYPES).is_err());
    }

    #[test]
    fn transient_elements_are_dropped() {
        let hidden = EntityDraft::new("Cache").annotate("transient").unwrap();
        let draft = task().field(FieldDraft::new("scratch", PropertyType::Int).annotate("-").unwrap());
        let model = build_current_model(&[draft, hidden], ID_TYPES).unwrap();
        assert_eq!(model.entities.len(), 1);
        assert_eq!(model.entities[0].properties.len(), 2);
    }

    #[test]
    fn comments_are_carried() {
        let model = build_current_model(&[task().doc("Things to do.")], ID_TYPES).unwrap();
        assert_eq!(model.entities[0].comments, ["Things to do."]);
    }
}
