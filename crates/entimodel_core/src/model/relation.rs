//! Standalone (many-to-many) relations.

use crate::error::{ModelError, ModelResult};
use crate::iduid::{IdUid, Uid};
use serde::{Deserialize, Serialize};

/// A many-to-many relation owned by its source entity.
///
/// The target is known by name while the schema is processed and by entity
/// id once the merge has resolved it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneRelation {
    /// Model-wide relation id and uid.
    pub id: IdUid,
    /// Relation name.
    pub name: String,
    /// Id of the target entity.
    #[serde(default, with = "crate::iduid::optional")]
    pub target_id: Option<IdUid>,
    /// Name of the target entity, as written in the schema.
    #[serde(skip)]
    pub target: String,
    /// Set when the schema asked for this relation's uid.
    #[serde(skip)]
    pub uid_request: bool,
}

impl StandaloneRelation {
    /// Creates an unnamed relation without a target.
    #[must_use]
    pub fn new(id: IdUid) -> Self {
        Self {
            id,
            name: String::new(),
            target_id: None,
            target: String::new(),
            uid_request: false,
        }
    }

    /// Checks identifiers and name.
    pub fn validate(&self) -> ModelResult<()> {
        self.id.validate()?;
        if self.name.is_empty() {
            return Err(ModelError::invalid("name is undefined"));
        }
        match self.target_id {
            Some(target) => target
                .validate()
                .map_err(|e| ModelError::invalid(format!("targetId: {e}"))),
            None => Err(ModelError::invalid("target entity is undefined")),
        }
    }

    /// Returns true if `uid` is the relation's uid.
    #[must_use]
    pub fn contains_uid(&self, uid: Uid) -> bool {
        self.id.uid() == uid
    }
}
