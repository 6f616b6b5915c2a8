//! Shared primitive IDs and the editable field enum.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::country::ValidationError;

/// Document identifier assigned by the remote store.
pub type RecordId = String;
/// Identity-provider user identifier.
pub type Uid = String;
/// Medal counter value.
pub type MedalCount = u32;

/// Name of the collection the medal store mirrors by default.
pub const DEFAULT_COLLECTION: &str = "countries";

/// Editable field of a country record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Display name.
    Name,
    /// Flag display token.
    Flag,
    /// Gold medal counter.
    Gold,
    /// Silver medal counter.
    Silver,
    /// Bronze medal counter.
    Bronze,
}

impl Field {
    /// All fields in wire order.
    pub const ALL: [Field; 5] = [Field::Name, Field::Flag, Field::Gold, Field::Silver, Field::Bronze];

    /// Wire name of the field in stored documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Flag => "flag",
            Field::Gold => "gold",
            Field::Silver => "silver",
            Field::Bronze => "bronze",
        }
    }

    /// True for the three medal counters.
    pub fn is_counter(self) -> bool {
        matches!(self, Field::Gold | Field::Silver | Field::Bronze)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}
