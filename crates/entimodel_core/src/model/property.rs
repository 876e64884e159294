//! Entity properties.

use super::types::{HnswParams, PropertyFlags, PropertyType};
use crate::error::{ModelError, ModelResult};
use crate::iduid::{IdUid, Uid};
use serde::{Deserialize, Serialize};

/// A property (field) of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Local id (within the entity) and global uid.
    pub id: IdUid,
    /// Name in the database.
    pub name: String,
    /// Index identifier, if the property is indexed.
    ///
    /// In a schema draft an index request is `Some(IdUid::ZERO)`; the merge
    /// replaces it with the allocated identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<IdUid>,
    /// Property type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Property flags.
    #[serde(default, skip_serializing_if = "PropertyFlags::is_unset")]
    pub flags: PropertyFlags,
    /// Target entity name of a to-one relation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relation_target: String,
    /// Vector index parameters for `index=hnsw`.
    #[serde(skip)]
    pub hnsw: Option<HnswParams>,
    /// Set when the schema asked for this property's uid.
    #[serde(skip)]
    pub uid_request: bool,
    /// Optional-wrapper hint for emitters.
    #[serde(skip)]
    pub optional: Option<String>,
}

impl Property {
    /// Creates an unnamed property.
    #[must_use]
    pub fn new(id: IdUid, property_type: PropertyType) -> Self {
        Self {
            id,
            name: String::new(),
            index_id: None,
            property_type,
            flags: PropertyFlags::empty(),
            relation_target: String::new(),
            hnsw: None,
            uid_request: false,
            optional: None,
        }
    }

    /// Adds flags.
    pub fn add_flags(&mut self, flags: PropertyFlags) {
        self.flags |= flags;
    }

    /// Returns true if the property is the object ID.
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.flags.contains(PropertyFlags::ID)
    }

    /// Returns true if the property is a to-one relation.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        !self.relation_target.is_empty()
    }

    /// Marks the property as indexed; the identifier is assigned on merge.
    pub fn request_index(&mut self) {
        if self.index_id.is_none() {
            self.index_id = Some(IdUid::ZERO);
        }
    }

    /// Returns true if `types` is empty and the type is `Long`, or the type
    /// is one of `types`.
    #[must_use]
    pub fn has_valid_id_type(&self, types: &[PropertyType]) -> bool {
        if types.is_empty() {
            self.property_type == PropertyType::Long
        } else {
            types.contains(&self.property_type)
        }
    }

    /// Checks the identifiers, name and ID constraints of a stored property.
    pub fn validate(&self) -> ModelResult<()> {
        self.id.validate()?;

        if let Some(index_id) = &self.index_id {
            index_id
                .validate()
                .map_err(|e| ModelError::invalid(format!("indexId: {e}")))?;
        }

        if self.name.is_empty() {
            return Err(ModelError::invalid("name is undefined"));
        }

        if self.is_id() {
            if self.property_type != PropertyType::Long {
                return Err(ModelError::type_mismatch(format!(
                    "invalid type on property marked as ID: {}",
                    self.property_type
                )));
            }
            if self.flags.contains(PropertyFlags::UNSIGNED) {
                return Err(ModelError::invalid(
                    "property marked as ID must not be flagged as unsigned",
                ));
            }
        }

        Ok(())
    }

    /// Returns true if `uid` is the property's or its index's uid.
    #[must_use]
    pub fn contains_uid(&self, uid: Uid) -> bool {
        self.id.uid() == uid || self.index_id.is_some_and(|i| i.uid() == uid)
    }

    /// FlatBuffers field slot, derived from the local id.
    #[must_use]
    pub fn fb_slot(&self) -> u32 {
        self.id.id().saturating_sub(1)
    }

    /// FlatBuffers vtable offset of the field.
    pub fn fb_vtable_offset(&self) -> ModelResult<u16> {
        let offset = 4 + 2 * u64::from(self.fb_slot());
        u16::try_from(offset).map_err(|_| {
            ModelError::invalid(format!(
                "can't calculate FlatBuffers vtable offset: property {} id {} is too large",
                self.name, self.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(id: u32, t: PropertyType) -> Property {
        let mut p = Property::new(IdUid::new(id, 1000 + u64::from(id)), t);
        p.name = format!("p{id}");
        p
    }

    #[test]
    fn vtable_offsets() {
        assert_eq!(prop(1, PropertyType::Long).fb_vtable_offset().unwrap(), 4);
        assert_eq!(prop(3, PropertyType::Long).fb_vtable_offset().unwrap(), 8);
        assert!(prop(40_000, PropertyType::Long).fb_vtable_offset().is_err());
    }

    #[test]
    fn id_property_must_be_long_and_signed() {
        let mut p = prop(1, PropertyType::String);
        p.add_flags(PropertyFlags::ID);
        assert!(matches!(p.validate(), Err(ModelError::TypeMismatch { .. })));

        p.property_type = PropertyType::Long;
        p.add_flags(PropertyFlags::UNSIGNED);
        assert!(p.validate().is_err());

        p.flags.remove(PropertyFlags::UNSIGNED);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn unassigned_index_fails_validation() {
        let mut p = prop(2, PropertyType::String);
        p.request_index();
        assert!(p.validate().is_err());
        p.index_id = Some(IdUid::new(1, 5));
        assert!(p.validate().is_ok());
        assert!(p.contains_uid(5));
    }

    #[test]
    fn request_index_keeps_existing() {
        let mut p = prop(2, PropertyType::String);
        p.index_id = Some(IdUid::new(3, 7));
        p.request_index();
        assert_eq!(p.index_id, Some(IdUid::new(3, 7)));
    }

    #[test]
    fn serialized_field_order_and_omissions() {
        let mut p = prop(2, PropertyType::String);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"id":"2:1002","name":"p2","type":9}"#);

        p.index_id = Some(IdUid::new(1, 77));
        p.add_flags(PropertyFlags::INDEX_HASH);
        p.relation_target = "Other".into();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(
            json,
            r#"{"id":"2:1002","name":"p2","indexId":"1:77","type":9,"flags":2048,"relationTarget":"Other"}"#
        );
    }
}
