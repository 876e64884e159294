//! Applies parsed annotations to entities and properties.

use crate::annotation::{Annotation, Annotations, RELATION_KEY_PREFIX};
use crate::error::{ModelError, ModelResult, ResultExt};
use crate::iduid::{IdUid, Uid};
use crate::model::{
    Entity, EntityFlags, HnswDistanceType, HnswFlags, HnswParams, Property, PropertyFlags,
    PropertyType, StandaloneRelation,
};
use std::str::FromStr;

/// Annotation names accepted on entities.
pub const ENTITY_ANNOTATIONS: &[&str] = &["-", "transient", "name", "relation", "sync", "uid"];

/// Annotation names accepted on properties.
pub const PROPERTY_ANNOTATIONS: &[&str] = &[
    "-",
    "transient",
    "date",
    "date-nano",
    "hnsw-dimensions",
    "hnsw-distance-type",
    "hnsw-flags",
    "hnsw-indexing-search-count",
    "hnsw-neighbors-per-node",
    "hnsw-reparation-backlink-probability",
    "hnsw-vector-cache-hint-size-kb",
    "id",
    "id-companion",
    "index",
    "link",
    "name",
    "optional",
    "relation",
    "unique",
    "uid",
];

/// Outcome of applying annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The element takes part in the model.
    Keep,
    /// The element is marked transient and is left out.
    Skip,
}

fn skip_requested(a: &Annotations, what: &str) -> ModelResult<bool> {
    for alternative in ["-", "transient"] {
        if let Some(annotation) = a.get(alternative) {
            if a.len() != 1 || !annotation.has_empty_value() {
                return Err(ModelError::conflicting(format!(
                    "to ignore the {what}, use only `{alternative}` as an annotation"
                )));
            }
            return Ok(true);
        }
    }
    Ok(false)
}

fn durable_name(a: &Annotations, what: &str) -> ModelResult<Option<String>> {
    match a.get("name") {
        None => Ok(None),
        Some(name) if name.has_empty_value() => Err(ModelError::invalid_annotation(
            "name",
            format!("value must not be empty - it's the {what} name in DB"),
        )),
        Some(name) => Ok(Some(name.value().to_string())),
    }
}

/// Outcome of a `uid` annotation.
enum UidAnnotation {
    Request,
    Set(Uid),
}

fn uid_annotation(value: &str) -> ModelResult<UidAnnotation> {
    if value.is_empty() {
        return Ok(UidAnnotation::Request);
    }
    match value.parse::<Uid>() {
        Ok(0) => Err(ModelError::invalid_annotation("uid", "value must not be zero")),
        Ok(uid) => Ok(UidAnnotation::Set(uid)),
        Err(e) => Err(ModelError::invalid_annotation(
            "uid",
            format!("can't parse '{value}': {e}"),
        )),
    }
}

/// Applies entity annotations: transient, `name`, `sync`, `uid` and
/// standalone `relation(...)` groups.
pub fn apply_entity_annotations(entity: &mut Entity, a: &Annotations) -> ModelResult<Disposition> {
    if skip_requested(a, "entity")? {
        return Ok(Disposition::Skip);
    }

    if let Some(name) = durable_name(a, "entity")? {
        entity.name = name;
    }

    if let Some(sync) = a.get("sync") {
        match sync {
            Annotation::Flag => {}
            Annotation::Group { details, .. } => {
                if details.contains("sharedglobalids") {
                    entity.flags |= EntityFlags::SHARED_GLOBAL_IDS;
                }
            }
            Annotation::Value(value) if value.is_empty() => {}
            Annotation::Value(value) => {
                return Err(ModelError::invalid_annotation(
                    "sync",
                    format!("unexpected value '{value}', use `sync` or `sync(sharedGlobalIds)`"),
                ))
            }
        }
        entity.flags |= EntityFlags::SYNC_ENABLED;
    }

    if let Some(uid) = a.get("uid") {
        match uid_annotation(uid.value())? {
            UidAnnotation::Request => entity.uid_request = true,
            UidAnnotation::Set(uid) => entity.id = entity.id.with_uid(uid),
        }
    }

    if a.get("relation").is_some() {
        return Err(ModelError::invalid_annotation(
            "relation",
            "standalone relations are declared as `relation(name=..., to=...)`",
        ));
    }

    // keys sort in declaration order
    for (_, group) in a.relations() {
        entity.relations.push(standalone_relation(group)?);
    }

    Ok(Disposition::Keep)
}

fn standalone_relation(group: &Annotation) -> ModelResult<StandaloneRelation> {
    let mut relation = StandaloneRelation::new(IdUid::ZERO);

    let name = group.detail("name").unwrap_or_default();
    if name.is_empty() {
        return Err(ModelError::missing_detail("relation", "name"));
    }
    name.clone_into(&mut relation.name);

    let target = group.detail("to").unwrap_or_default();
    if target.is_empty() {
        return Err(ModelError::missing_detail("relation", "to").at(format!("relation {name:?}")));
    }
    target.clone_into(&mut relation.target);

    if let Some(uid) = group.detail("uid") {
        match uid_annotation(uid).at(|| format!("relation {name:?}"))? {
            UidAnnotation::Request => relation.uid_request = true,
            UidAnnotation::Set(uid) => relation.id = relation.id.with_uid(uid),
        }
    }

    Ok(relation)
}

/// Applies property annotations.
///
/// Annotations are evaluated in a fixed order (id, name, dates, unique and
/// index, uid, to-one relation, optional, hnsw parameters) so that the first
/// reported problem does not depend on how the schema spelled them.
pub fn apply_property_annotations(
    property: &mut Property,
    a: &Annotations,
) -> ModelResult<Disposition> {
    if skip_requested(a, "property")? {
        return Ok(Disposition::Skip);
    }

    if let Some(id) = a.get("id") {
        if !id.has_empty_value() {
            return Err(ModelError::invalid_annotation(
                "id",
                format!("unexpected value '{}', use `id` or `id(assignable)`", id.value()),
            ));
        }
        property.add_flags(PropertyFlags::ID);
        if id.details().is_some_and(|d| d.contains("assignable")) {
            property.add_flags(PropertyFlags::ID_SELF_ASSIGNABLE);
        }
    }

    if let Some(name) = durable_name(a, "property")? {
        property.name = name;
    }

    apply_date(property, a)?;

    if a.contains("id-companion") {
        if !matches!(property.property_type, PropertyType::Date | PropertyType::DateNano) {
            return Err(ModelError::type_mismatch(format!(
                "invalid underlying type '{}' for ID companion field; expecting date or date-nano",
                property.property_type
            )));
        }
        property.add_flags(PropertyFlags::ID_COMPANION);
    }

    let mut index = a.get("index").map(|i| i.value().to_ascii_lowercase());
    if a.contains("unique") {
        property.add_flags(PropertyFlags::UNIQUE);
        index.get_or_insert_with(String::new);
    }
    if let Some(kind) = index {
        apply_index(property, &kind)?;
    }

    if let Some(uid) = a.get("uid") {
        match uid_annotation(uid.value())? {
            UidAnnotation::Request => property.uid_request = true,
            UidAnnotation::Set(uid) => property.id = property.id.with_uid(uid),
        }
    }

    if a.iter().any(|(key, _)| key.starts_with(RELATION_KEY_PREFIX)) {
        return Err(ModelError::invalid_annotation(
            "relation",
            "standalone relations are declared on the entity, use `relation=Target` on a property",
        ));
    }
    if let Some(target) = a.get("relation").or_else(|| a.get("link")) {
        apply_to_one(property, target.value())?;
    }

    if let Some(optional) = a.get("optional") {
        property.optional = Some(optional.value().to_string());
    }

    apply_hnsw(property, a)?;

    Ok(Disposition::Keep)
}

fn apply_date(property: &mut Property, a: &Annotations) -> ModelResult<()> {
    let (date, nano) = (a.contains("date"), a.contains("date-nano"));
    if !date && !nano {
        return Ok(());
    }
    if date && nano {
        return Err(ModelError::conflicting(
            "date and date-nano annotations cannot be used at the same time",
        ));
    }
    if property.property_type != PropertyType::Long {
        return Err(ModelError::type_mismatch(format!(
            "invalid underlying type '{}' for date/date-nano field; expecting long",
            property.property_type
        )));
    }
    property.property_type = if date {
        PropertyType::Date
    } else {
        PropertyType::DateNano
    };
    Ok(())
}

fn apply_index(property: &mut Property, kind: &str) -> ModelResult<()> {
    let flags = match kind {
        "" if property.property_type == PropertyType::String => PropertyFlags::INDEX_HASH,
        "" | "value" => PropertyFlags::INDEXED,
        "hash" => PropertyFlags::INDEX_HASH,
        "hash64" => PropertyFlags::INDEX_HASH64,
        "hnsw" => {
            if property.property_type != PropertyType::FloatVector {
                return Err(ModelError::type_mismatch(format!(
                    "hnsw index is only supported on FloatVector properties, found '{}'",
                    property.property_type
                )));
            }
            property.hnsw = Some(HnswParams::default());
            PropertyFlags::INDEXED
        }
        other => {
            return Err(ModelError::invalid_annotation(
                "index",
                format!("unknown index type '{other}'"),
            ))
        }
    };
    property.add_flags(flags);
    property.request_index();
    Ok(())
}

fn apply_to_one(property: &mut Property, target: &str) -> ModelResult<()> {
    if property.property_type == PropertyType::Relation {
        return Ok(());
    }
    if property.property_type != PropertyType::Long {
        return Err(ModelError::type_mismatch(format!(
            "invalid underlying type '{}' for relation field; expecting long",
            property.property_type
        )));
    }
    if target.is_empty() {
        return Err(ModelError::missing_detail("relation", "target entity"));
    }
    property.property_type = PropertyType::Relation;
    target.clone_into(&mut property.relation_target);
    property.add_flags(PropertyFlags::INDEXED | PropertyFlags::INDEX_PARTIAL_SKIP_ZERO);
    property.request_index();
    Ok(())
}

fn parse_number<T: FromStr>(annotation: &str, value: &str) -> ModelResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        ModelError::invalid_annotation(annotation, format!("can't parse '{value}': {e}"))
    })
}

fn apply_hnsw(property: &mut Property, a: &Annotations) -> ModelResult<()> {
    let mut given = a.iter().filter(|(key, _)| key.starts_with("hnsw-")).peekable();
    let Some(params) = property.hnsw.as_mut() else {
        if let Some((key, _)) = given.peek() {
            return Err(ModelError::invalid_annotation(
                *key,
                "requires a vector index, add `index=hnsw`",
            ));
        }
        return Ok(());
    };

    for (key, annotation) in given {
        let value = annotation.value();
        match key {
            "hnsw-dimensions" => params.dimensions = Some(parse_number(key, value)?),
            "hnsw-distance-type" => {
                params.distance_type = HnswDistanceType::from_name(value)
                    .map_err(|e| ModelError::invalid_annotation(key, e))?;
            }
            "hnsw-neighbors-per-node" => {
                params.neighbors_per_node = Some(parse_number(key, value)?);
            }
            "hnsw-indexing-search-count" => {
                params.indexing_search_count = Some(parse_number(key, value)?);
            }
            "hnsw-reparation-backlink-probability" => {
                let probability: f32 = parse_number(key, value)?;
                if !(0.0..=1.0).contains(&probability) {
                    return Err(ModelError::invalid_annotation(
                        key,
                        format!("{probability} is not a probability between 0 and 1"),
                    ));
                }
                params.reparation_backlink_probability = Some(probability);
            }
            "hnsw-vector-cache-hint-size-kb" => {
                params.vector_cache_hint_size_kb = Some(parse_number(key, value)?);
            }
            "hnsw-flags" => {
                params.flags = HnswFlags::from_names(value)
                    .map_err(|e| ModelError::invalid_annotation(key, e))?;
            }
            other => {
                return Err(ModelError::UnknownAnnotation {
                    name: other.to_string(),
                })
            }
        }
    }

    if params.dimensions.is_none() {
        return Err(ModelError::missing_detail("index=hnsw", "hnsw-dimensions"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(annotations: &str) -> ModelResult<(Entity, Disposition)> {
        let a = Annotations::parse(annotations, ENTITY_ANNOTATIONS)?;
        let mut e = Entity::new(IdUid::ZERO);
        e.name = "Task".into();
        let d = apply_entity_annotations(&mut e, &a)?;
        Ok((e, d))
    }

    fn property(t: PropertyType, annotations: &str) -> ModelResult<(Property, Disposition)> {
        let a = Annotations::parse(annotations, PROPERTY_ANNOTATIONS)?;
        let mut p = Property::new(IdUid::ZERO, t);
        p.name = "field".into();
        let d = apply_property_annotations(&mut p, &a)?;
        Ok((p, d))
    }

    #[test]
    fn transient_entity() {
        assert_eq!(entity("-").unwrap().1, Disposition::Skip);
        assert_eq!(entity("transient").unwrap().1, Disposition::Skip);
        let err = entity("-, name=x").unwrap_err();
        assert!(matches!(err, ModelError::ConflictingAnnotations { .. }));
    }

    #[test]
    fn entity_name_sync_uid() {
        let (e, d) = entity("name=tasks sync(sharedGlobalIds) uid=42").unwrap();
        assert_eq!(d, Disposition::Keep);
        assert_eq!(e.name, "tasks");
        assert_eq!(e.flags, EntityFlags::SYNC_ENABLED | EntityFlags::SHARED_GLOBAL_IDS);
        assert_eq!(e.id, IdUid::new(0, 42));

        let (e, _) = entity("sync").unwrap();
        assert_eq!(e.flags, EntityFlags::SYNC_ENABLED);

        let (e, _) = entity("uid").unwrap();
        assert!(e.uid_request);

        assert!(entity("name=\"\"").is_err());
        assert!(entity("uid=abc").is_err());
    }

    #[test]
    fn standalone_relations_in_declaration_order() {
        let (e, _) = entity("relation(name=tags,to=Tag) relation(name=owners, to=Person, uid=77)").unwrap();
        let names: Vec<_> = e.relations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["tags", "owners"]);
        assert_eq!(e.relations[0].target, "Tag");
        assert_eq!(e.relations[1].id.uid(), 77);

        let (e, _) = entity("relation(name=tags,to=Tag,uid)").unwrap();
        assert!(e.relations[0].uid_request);
    }

    #[test]
    fn standalone_relation_requires_target() {
        let err = entity("relation(name=tags)").unwrap_err();
        assert!(matches!(err.root(), ModelError::MissingDetail { detail, .. } if detail == "to"));
    }

    #[test]
    fn id_and_assignable() {
        let (p, _) = property(PropertyType::Long, "id(assignable)").unwrap();
        assert_eq!(p.flags, PropertyFlags::ID | PropertyFlags::ID_SELF_ASSIGNABLE);
        assert!(property(PropertyType::Long, "id(assignable=yes)").is_err());
    }

    #[test]
    fn dates() {
        let (p, _) = property(PropertyType::Long, "date").unwrap();
        assert_eq!(p.property_type, PropertyType::Date);
        let (p, _) = property(PropertyType::Long, "date-nano,id-companion").unwrap();
        assert_eq!(p.property_type, PropertyType::DateNano);
        assert!(p.flags.contains(PropertyFlags::ID_COMPANION));

        let err = property(PropertyType::Long, "date date-nano").unwrap_err();
        assert!(matches!(err, ModelError::ConflictingAnnotations { .. }));
        let err = property(PropertyType::String, "date").unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
        let err = property(PropertyType::Long, "id-companion").unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
    }

    #[test]
    fn index_kinds() {
        let (p, _) = property(PropertyType::String, "index").unwrap();
        assert_eq!(p.flags, PropertyFlags::INDEX_HASH);
        assert_eq!(p.index_id, Some(IdUid::ZERO));

        let (p, _) = property(PropertyType::Int, "index").unwrap();
        assert_eq!(p.flags, PropertyFlags::INDEXED);
        let (p, _) = property(PropertyType::String, "index=value").unwrap();
        assert_eq!(p.flags, PropertyFlags::INDEXED);
        let (p, _) = property(PropertyType::String, "index=hash64").unwrap();
        assert_eq!(p.flags, PropertyFlags::INDEX_HASH64);

        let err = property(PropertyType::String, "index=btree").unwrap_err();
        assert!(matches!(err, ModelError::InvalidAnnotation { .. }));
    }

    #[test]
    fn unique_implies_default_index() {
        let (p, _) = property(PropertyType::String, "unique").unwrap();
        assert_eq!(p.flags, PropertyFlags::UNIQUE | PropertyFlags::INDEX_HASH);
        assert!(p.index_id.is_some());

        let (p, _) = property(PropertyType::String, "unique index=value").unwrap();
        assert_eq!(p.flags, PropertyFlags::UNIQUE | PropertyFlags::INDEXED);
    }

    #[test]
    fn property_uid() {
        let (p, _) = property(PropertyType::String, "uid=123").unwrap();
        assert_eq!(p.id.uid(), 123);
        let (p, _) = property(PropertyType::String, "uid").unwrap();
        assert!(p.uid_request);
        assert!(property(PropertyType::String, "uid=0").is_err());
    }

    #[test]
    fn to_one_relation() {
        let (p, _) = property(PropertyType::Long, "relation=Customer").unwrap();
        assert_eq!(p.property_type, PropertyType::Relation);
        assert_eq!(p.relation_target, "Customer");
        assert_eq!(
            p.flags,
            PropertyFlags::INDEXED | PropertyFlags::INDEX_PARTIAL_SKIP_ZERO
        );
        assert!(p.index_id.is_some());

        let (p, _) = property(PropertyType::Long, "link=Customer").unwrap();
        assert!(p.is_relation());

        let err = property(PropertyType::String, "link=Customer").unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
        assert!(property(PropertyType::Long, "link").is_err());
    }

    #[test]
    fn optional_hint() {
        let (p, _) = property(PropertyType::String, "optional=std::optional").unwrap();
        assert_eq!(p.optional.as_deref(), Some("std::optional"));
        let (p, _) = property(PropertyType::String, "optional").unwrap();
        assert_eq!(p.optional.as_deref(), Some(""));
    }

    #[test]
    fn hnsw_parameters() {
        let (p, _) = property(
            PropertyType::FloatVector,
            "index=hnsw hnsw-dimensions=3 hnsw-distance-type=cosine hnsw-neighbors-per-node=30 \
             hnsw-flags=debug-logs|vector-cache-simd-padding-off hnsw-reparation-backlink-probability=0.5",
        )
        .unwrap();
        let params = p.hnsw.unwrap();
        assert_eq!(params.dimensions, Some(3));
        assert_eq!(params.distance_type, HnswDistanceType::Cosine);
        assert_eq!(params.neighbors_per_node, Some(30));
        assert_eq!(params.reparation_backlink_probability, Some(0.5));
        assert_eq!(
            params.flags,
            HnswFlags::DEBUG_LOGS | HnswFlags::VECTOR_CACHE_SIMD_PADDING_OFF
        );
        assert!(p.flags.contains(PropertyFlags::INDEXED));
    }

    #[test]
    fn hnsw_requirements() {
        let err = property(PropertyType::FloatVector, "hnsw-dimensions=3").unwrap_err();
        assert!(matches!(err, ModelError::InvalidAnnotation { .. }));

        let err = property(PropertyType::ByteVector, "index=hnsw hnsw-dimensions=3").unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));

        let err = property(PropertyType::FloatVector, "index=hnsw").unwrap_err();
        assert!(matches!(err, ModelError::MissingDetail { .. }));

        let err = property(PropertyType::FloatVector, "index=hnsw hnsw-dimensions=3 hnsw-flags=fast")
            .unwrap_err();
        assert!(err.to_string().contains("debug-logs, debug-logs-detailed"));
    }

    #[test]
    fn transient_property() {
        assert_eq!(property(PropertyType::Int, "-").unwrap().1, Disposition::Skip);
        assert!(property(PropertyType::Int, "transient index").is_err());
    }
}
