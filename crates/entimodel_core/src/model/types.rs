//! Property type codes, flag sets and vector index parameters.
//!
//! All numeric codes are part of the persisted model format and of the
//! runtime's binary record layout; they never change.

use bitflags::bitflags;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Type of a property as stored in the record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PropertyType {
    /// Boolean.
    Bool = 1,
    /// 8-bit integer.
    Byte = 2,
    /// 16-bit integer.
    Short = 3,
    /// 16-bit character.
    Char = 4,
    /// 32-bit integer.
    Int = 5,
    /// 64-bit integer.
    Long = 6,
    /// 32-bit float.
    Float = 7,
    /// 64-bit float.
    Double = 8,
    /// UTF-8 string.
    String = 9,
    /// Milliseconds since the epoch.
    Date = 10,
    /// To-one relation (id of the target object).
    Relation = 11,
    /// Nanoseconds since the epoch.
    DateNano = 12,
    /// Byte array.
    ByteVector = 23,
    /// Float array, used for vector search.
    FloatVector = 28,
    /// String array.
    StringVector = 30,
}

impl PropertyType {
    /// All known types, in code order.
    pub const ALL: [Self; 15] = [
        Self::Bool,
        Self::Byte,
        Self::Short,
        Self::Char,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::String,
        Self::Date,
        Self::Relation,
        Self::DateNano,
        Self::ByteVector,
        Self::FloatVector,
        Self::StringVector,
    ];

    /// Returns the stable numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Looks a type up by its numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Byte => "Byte",
            Self::Short => "Short",
            Self::Char => "Char",
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Date => "Date",
            Self::Relation => "Relation",
            Self::DateNano => "DateNano",
            Self::ByteVector => "ByteVector",
            Self::FloatVector => "FloatVector",
            Self::StringVector => "StringVector",
        }
    }

    /// Returns true for the array types.
    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(self, Self::ByteVector | Self::FloatVector | Self::StringVector)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown property type '{s}'"))
    }
}

impl Serialize for PropertyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for PropertyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown property type code {code}")))
    }
}

bitflags! {
    /// Property flags, combined with bitwise OR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u32 {
        /// The object ID.
        const ID = 1;
        /// Nullable non-primitive wrapper type.
        const NON_PRIMITIVE_TYPE = 2;
        /// Value must not be null.
        const NOT_NULL = 4;
        /// Value index.
        const INDEXED = 8;
        /// Reserved for internal use.
        const RESERVED = 16;
        /// Unique constraint.
        const UNIQUE = 32;
        /// IDs are assigned by a monotonic sequence.
        const ID_MONOTONIC_SEQUENCE = 64;
        /// The application may assign IDs itself.
        const ID_SELF_ASSIGNABLE = 128;
        /// Null values are not indexed.
        const INDEX_PARTIAL_SKIP_NULL = 256;
        /// Zero values are not indexed.
        const INDEX_PARTIAL_SKIP_ZERO = 512;
        /// Virtual property, not stored.
        const VIRTUAL = 1024;
        /// 32-bit hash index.
        const INDEX_HASH = 2048;
        /// 64-bit hash index.
        const INDEX_HASH64 = 4096;
        /// Unsigned integer.
        const UNSIGNED = 8192;
        /// Date used together with the ID for time series.
        const ID_COMPANION = 16384;
    }
}

bitflags! {
    /// Entity flags, combined with bitwise OR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityFlags: u32 {
        /// Objects are synchronized.
        const SYNC_ENABLED = 2;
        /// Object IDs are shared across synced devices.
        const SHARED_GLOBAL_IDS = 4;
    }
}

macro_rules! serde_flag_bits {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(self.bits())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                u32::deserialize(deserializer).map(Self::from_bits_retain)
            }
        }

        impl $ty {
            /// Serde skip predicate: zero flags are omitted from the document.
            #[must_use]
            pub fn is_unset(&self) -> bool {
                self.is_empty()
            }
        }
    };
}

serde_flag_bits!(PropertyFlags);
serde_flag_bits!(EntityFlags);

/// Distance function of an HNSW vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum HnswDistanceType {
    /// Not specified; the runtime default (euclidean) applies.
    #[default]
    Unknown = 0,
    /// Squared euclidean distance.
    Euclidean = 1,
    /// Cosine distance.
    Cosine = 2,
    /// Dot product on normalized vectors.
    DotProduct = 3,
    /// Haversine distance on latitude/longitude pairs.
    Geo = 6,
    /// Dot product without normalization.
    DotProductNonNormalized = 10,
}

impl HnswDistanceType {
    const NAMES: [(&'static str, Self); 5] = [
        ("cosine", Self::Cosine),
        ("dot-product", Self::DotProduct),
        ("dot-product-non-normalized", Self::DotProductNonNormalized),
        ("euclidean", Self::Euclidean),
        ("geo", Self::Geo),
    ];

    /// Parses an annotation value such as `cosine`.
    pub fn from_name(name: &str) -> Result<Self, String> {
        let lower = name.to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, t)| *t)
            .ok_or_else(|| {
                let valid: Vec<_> = Self::NAMES.iter().map(|(n, _)| *n).collect();
                format!(
                    "unknown distance type '{name}', expecting one of: {}",
                    valid.join(", ")
                )
            })
    }
}

bitflags! {
    /// Flags of an HNSW vector index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HnswFlags: u32 {
        /// Log index operations.
        const DEBUG_LOGS = 1;
        /// Log index operations in detail.
        const DEBUG_LOGS_DETAILED = 2;
        /// Don't pad vectors for SIMD in the vector cache.
        const VECTOR_CACHE_SIMD_PADDING_OFF = 4;
        /// Limit the candidates considered while repairing the graph.
        const REPARATION_LIMIT_CANDIDATES = 8;
    }
}

impl HnswFlags {
    const NAMES: [(&'static str, Self); 4] = [
        ("debug-logs", Self::DEBUG_LOGS),
        ("debug-logs-detailed", Self::DEBUG_LOGS_DETAILED),
        ("reparation-limit-candidates", Self::REPARATION_LIMIT_CANDIDATES),
        ("vector-cache-simd-padding-off", Self::VECTOR_CACHE_SIMD_PADDING_OFF),
    ];

    /// Parses flag names joined by `|`, e.g. `debug-logs|reparation-limit-candidates`.
    pub fn from_names(text: &str) -> Result<Self, String> {
        let mut flags = Self::empty();
        for name in text.split('|').map(str::trim).filter(|n| !n.is_empty()) {
            let lower = name.to_ascii_lowercase();
            let Some((_, flag)) = Self::NAMES.iter().find(|(n, _)| *n == lower) else {
                let mut valid: Vec<_> = Self::NAMES.iter().map(|(n, _)| *n).collect();
                valid.sort_unstable();
                return Err(format!(
                    "unknown flag '{name}', expecting any of: {}",
                    valid.join(", ")
                ));
            };
            flags |= *flag;
        }
        Ok(flags)
    }
}

/// Parameters of an HNSW vector index on a `FloatVector` property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HnswParams {
    /// Number of vector dimensions; required.
    pub dimensions: Option<u64>,
    /// Distance function.
    pub distance_type: HnswDistanceType,
    /// Maximum number of connections per node.
    pub neighbors_per_node: Option<u32>,
    /// Number of neighbors searched while indexing.
    pub indexing_search_count: Option<u32>,
    /// Probability of adding backlinks during repair.
    pub reparation_backlink_probability: Option<f32>,
    /// Size hint of the vector cache in kilobytes.
    pub vector_cache_hint_size_kb: Option<u64>,
    /// Index flags.
    pub flags: HnswFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_are_stable() {
        assert_eq!(PropertyType::Bool.code(), 1);
        assert_eq!(PropertyType::Long.code(), 6);
        assert_eq!(PropertyType::Relation.code(), 11);
        assert_eq!(PropertyType::ByteVector.code(), 23);
        assert_eq!(PropertyType::StringVector.code(), 30);
        assert_eq!(PropertyType::from_code(9), Some(PropertyType::String));
        assert_eq!(PropertyType::from_code(99), None);
    }

    #[test]
    fn type_parses_by_name() {
        assert_eq!("long".parse::<PropertyType>().unwrap(), PropertyType::Long);
        assert_eq!(
            "FloatVector".parse::<PropertyType>().unwrap(),
            PropertyType::FloatVector
        );
        assert!("uint128".parse::<PropertyType>().is_err());
    }

    #[test]
    fn flag_bits_are_stable() {
        assert_eq!(PropertyFlags::ID.bits(), 1);
        assert_eq!(PropertyFlags::INDEX_PARTIAL_SKIP_ZERO.bits(), 512);
        assert_eq!(PropertyFlags::UNSIGNED.bits(), 8192);
        assert_eq!(PropertyFlags::ID_COMPANION.bits(), 16384);
    }

    #[test]
    fn flags_serialize_as_integers() {
        let flags = PropertyFlags::ID | PropertyFlags::UNSIGNED;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "8193");
        let back: PropertyFlags = serde_json::from_str("8193").unwrap();
        assert_eq!(back, flags);
        // unknown bits survive a round trip
        let odd: PropertyFlags = serde_json::from_str("65536").unwrap();
        assert_eq!(odd.bits(), 65536);
    }

    #[test]
    fn hnsw_flag_names() {
        let flags = HnswFlags::from_names("debug-logs | reparation-limit-candidates").unwrap();
        assert_eq!(
            flags,
            HnswFlags::DEBUG_LOGS | HnswFlags::REPARATION_LIMIT_CANDIDATES
        );

        let err = HnswFlags::from_names("debug-logs|fast").unwrap_err();
        assert!(err.contains(
            "debug-logs, debug-logs-detailed, reparation-limit-candidates, vector-cache-simd-padding-off"
        ));
    }

    #[test]
    fn hnsw_distance_names() {
        assert_eq!(
            HnswDistanceType::from_name("Cosine").unwrap(),
            HnswDistanceType::Cosine
        );
        assert!(HnswDistanceType::from_name("manhattan").is_err());
    }
}
