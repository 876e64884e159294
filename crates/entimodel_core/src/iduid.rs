//! Identifier pairs.

use crate::error::{ModelError, ModelResult};
use serde::de::{self, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Locally scoped identifier (unique within its enclosing scope).
pub type Id = u32;

/// Globally unique identifier (unique within a model file, never reused).
pub type Uid = u64;

/// A pair of a local [`Id`] and a global [`Uid`].
///
/// The textual form is `"<id>:<uid>"`. A pair with both parts zero stands for
/// an identifier that has not been assigned yet; schema drafts carry such
/// pairs until the merge resolves them against the stored model.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdUid {
    id: Id,
    uid: Uid,
}

impl IdUid {
    /// The unassigned pair `0:0`.
    pub const ZERO: Self = Self { id: 0, uid: 0 };

    /// Creates a pair from its parts.
    #[inline]
    #[must_use]
    pub const fn new(id: Id, uid: Uid) -> Self {
        Self { id, uid }
    }

    /// Parses `"id:uid"`, rejecting zero components.
    pub fn parse(text: &str) -> ModelResult<Self> {
        let pair = Self::parse_allow_zero(text)?;
        pair.validate().map_err(|_| {
            let part = if pair.id == 0 { "id" } else { "uid" };
            ModelError::malformed_id(text, format!("{part} is zero"))
        })?;
        Ok(pair)
    }

    /// Parses `"id:uid"`, accepting zero components.
    ///
    /// Used for relation targets whose entity id is not resolved yet.
    pub fn parse_allow_zero(text: &str) -> ModelResult<Self> {
        if text.is_empty() {
            return Err(ModelError::malformed_id(text, "id is undefined"));
        }
        let mut parts = text.split(':');
        let (Some(id), Some(uid), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ModelError::malformed_id(
                text,
                "expected exactly one ':' separator",
            ));
        };
        let id = id.parse::<Id>().map_err(|e| {
            ModelError::malformed_id(text, format!("can't parse '{id}' as unsigned int: {e}"))
        })?;
        let uid = uid.parse::<Uid>().map_err(|e| {
            ModelError::malformed_id(text, format!("can't parse '{uid}' as unsigned int: {e}"))
        })?;
        Ok(Self { id, uid })
    }

    /// Checks that both parts are non-zero.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id == 0 {
            return Err(ModelError::malformed_id(self.to_string(), "id is zero"));
        }
        if self.uid == 0 {
            return Err(ModelError::malformed_id(self.to_string(), "uid is zero"));
        }
        Ok(())
    }

    /// Returns the local id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// Returns the global uid.
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> Uid {
        self.uid
    }

    /// Returns both parts.
    #[inline]
    #[must_use]
    pub const fn pair(&self) -> (Id, Uid) {
        (self.id, self.uid)
    }

    /// Returns true for the unassigned pair `0:0`.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.id == 0 && self.uid == 0
    }

    /// Returns a copy with the uid replaced.
    #[inline]
    #[must_use]
    pub const fn with_uid(self, uid: Uid) -> Self {
        Self { id: self.id, uid }
    }
}

impl fmt::Debug for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdUid({}:{})", self.id, self.uid)
    }
}

impl fmt::Display for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.uid)
    }
}

impl FromStr for IdUid {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<(Id, Uid)> for IdUid {
    fn from((id, uid): (Id, Uid)) -> Self {
        Self::new(id, uid)
    }
}

impl Serialize for IdUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for IdUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(IdUidVisitor)
    }
}

struct IdUidVisitor;

impl Visitor<'_> for IdUidVisitor {
    type Value = IdUid;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an \"id:uid\" string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        IdUid::parse_allow_zero(v).map_err(E::custom)
    }
}

/// Serde adapter for identifiers that may be unset.
///
/// Unset serializes as `""`; both `""` and `"0:0"` deserialize as unset.
pub(crate) mod optional {
    use super::IdUid;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<IdUid>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<IdUid>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Ok(None);
        }
        let id = IdUid::parse_allow_zero(&text).map_err(serde::de::Error::custom)?;
        Ok((!id.is_zero()).then_some(id))
    }
}
