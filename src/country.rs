//! Country medal record, draft, text input, and single-field update types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Field, MedalCount, RecordId};

/// Rejected user input at an action entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Field name is not one of the editable fields.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// Counter text is not a non-negative integer.
    #[error("invalid {field} count: {value:?}")]
    InvalidCount {
        /// Counter being parsed.
        field: Field,
        /// Raw text as supplied.
        value: String,
    },
}

/// Live country record as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Country {
    /// Store-assigned document id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Flag display token (emoji or URI).
    pub flag: String,
    /// Gold medals.
    pub gold: MedalCount,
    /// Silver medals.
    pub silver: MedalCount,
    /// Bronze medals.
    pub bronze: MedalCount,
}

impl Country {
    /// Materializes a record from a draft and its assigned id.
    pub fn from_draft(id: impl Into<RecordId>, draft: CountryDraft) -> Self {
        Self {
            id: id.into(),
            name: draft.name,
            flag: draft.flag,
            gold: draft.gold,
            silver: draft.silver,
            bronze: draft.bronze,
        }
    }

    /// Sum of all three counters.
    pub fn total(&self) -> u64 {
        u64::from(self.gold) + u64::from(self.silver) + u64::from(self.bronze)
    }
}

/// Typed payload for creating a record; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryDraft {
    /// Display name.
    pub name: String,
    /// Flag display token.
    pub flag: String,
    /// Gold medals.
    pub gold: MedalCount,
    /// Silver medals.
    pub silver: MedalCount,
    /// Bronze medals.
    pub bronze: MedalCount,
}

/// Text form of a draft as collected from a form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountryInput {
    /// Display name.
    pub name: String,
    /// Flag display token.
    pub flag: String,
    /// Gold medals, as text.
    pub gold: String,
    /// Silver medals, as text.
    pub silver: String,
    /// Bronze medals, as text.
    pub bronze: String,
}

impl CountryInput {
    /// Parses the counters and produces a [`CountryDraft`].
    pub fn parse(&self) -> Result<CountryDraft, ValidationError> {
        Ok(CountryDraft {
            name: self.name.clone(),
            flag: self.flag.clone(),
            gold: parse_count(Field::Gold, &self.gold)?,
            silver: parse_count(Field::Silver, &self.silver)?,
            bronze: parse_count(Field::Bronze, &self.bronze)?,
        })
    }
}

/// Partial update of exactly one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "lowercase")]
pub enum FieldUpdate {
    /// Replace the name.
    Name(String),
    /// Replace the flag token.
    Flag(String),
    /// Replace the gold counter.
    Gold(MedalCount),
    /// Replace the silver counter.
    Silver(MedalCount),
    /// Replace the bronze counter.
    Bronze(MedalCount),
}

impl FieldUpdate {
    /// Builds an update from raw text. Counters are parsed, text fields pass
    /// through unchanged.
    pub fn parse(field: Field, raw: &str) -> Result<Self, ValidationError> {
        Ok(match field {
            Field::Name => FieldUpdate::Name(raw.to_string()),
            Field::Flag => FieldUpdate::Flag(raw.to_string()),
            Field::Gold => FieldUpdate::Gold(parse_count(field, raw)?),
            Field::Silver => FieldUpdate::Silver(parse_count(field, raw)?),
            Field::Bronze => FieldUpdate::Bronze(parse_count(field, raw)?),
        })
    }

    /// Field this update targets.
    pub fn field(&self) -> Field {
        match self {
            FieldUpdate::Name(_) => Field::Name,
            FieldUpdate::Flag(_) => Field::Flag,
            FieldUpdate::Gold(_) => Field::Gold,
            FieldUpdate::Silver(_) => Field::Silver,
            FieldUpdate::Bronze(_) => Field::Bronze,
        }
    }

    /// Value as it is written to the document: numbers for counters,
    /// strings for text fields.
    pub fn to_json(&self) -> Value {
        match self {
            FieldUpdate::Name(v) | FieldUpdate::Flag(v) => Value::String(v.clone()),
            FieldUpdate::Gold(n) | FieldUpdate::Silver(n) | FieldUpdate::Bronze(n) => Value::from(*n),
        }
    }

    /// Applies this update in place to `rec`.
    pub fn apply_to(&self, rec: &mut Country) {
        match self {
            FieldUpdate::Name(v) => rec.name = v.clone(),
            FieldUpdate::Flag(v) => rec.flag = v.clone(),
            FieldUpdate::Gold(n) => rec.gold = *n,
            FieldUpdate::Silver(n) => rec.silver = *n,
            FieldUpdate::Bronze(n) => rec.bronze = *n,
        }
    }
}

/// Parses counter text after trimming surrounding whitespace.
///
/// Only plain decimal digits are accepted; signs, fractions, exponents and
/// empty input are rejected.
pub fn parse_count(field: Field, raw: &str) -> Result<MedalCount, ValidationError> {
    let trimmed = raw.trim();
    let invalid = || ValidationError::InvalidCount {
        field,
        value: raw.to_string(),
    };
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    trimmed.parse::<MedalCount>().map_err(|_| invalid())
}
