use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A kiosk interaction as it arrives from an archived export or the live feed.
///
/// Every field is kept as an untyped JSON value so that both framings (CSV rows, where
/// everything is a string, and decoded feed messages, where `val` and `type` are
/// integers) go through the exact same normalization.
/// `None` means the field was absent, `Some(Value::Null)` that it was sent as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInteractionRecord {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub at: Option<Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub site: Option<Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub val: Option<Value>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_type: Option<Value>,
}

// Without this, serde folds an explicit `null` into `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RawInteractionRecord {
    /// Build a record where all four fields are present as strings, the shape of an export row.
    pub fn from_strings(at: &str, site: &str, val: &str, request_type: &str) -> Self {
        Self {
            at: Some(Value::String(at.to_owned())),
            site: Some(Value::String(site.to_owned())),
            val: Some(Value::String(val.to_owned())),
            request_type: Some(Value::String(request_type.to_owned())),
        }
    }

    /// Set a field by its column name. Returns false for columns this record does not carry.
    pub fn set_column(&mut self, column: &str, value: Value) -> bool {
        let slot = match column {
            "at" => &mut self.at,
            "site" => &mut self.site,
            "val" => &mut self.val,
            "type" => &mut self.request_type,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Render the record back to JSON for diagnostics.
    pub fn to_log_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Which destination table an interaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Rating,
    Request,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating",
            InteractionKind::Request => "request",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating_interaction",
            InteractionKind::Request => "request_interaction",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully validated interaction: every id is a resolved surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizedInteraction {
    pub kind: InteractionKind,
    pub event_at: NaiveDateTime,
    pub exhibition_id: i32,
    pub value_id: i32,
}

/// Normalized interactions of one batch run, bucketed per destination table in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub ratings: Vec<NormalizedInteraction>,
    pub requests: Vec<NormalizedInteraction>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interaction: NormalizedInteraction) {
        match interaction.kind {
            InteractionKind::Rating => self.ratings.push(interaction),
            InteractionKind::Request => self.requests.push(interaction),
        }
    }

    pub fn len(&self) -> usize {
        self.ratings.len() + self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty() && self.requests.is_empty()
    }
}
