//! Project records as served by `/projects`.
//!
//! The server owns the field set. The client only relies on the `id`, the
//! name field used for search, and the two visibility markers; every other
//! field passes through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::identity::ProjectId;

/// Field holding the display name that search matches against.
pub const NAME_FIELD: &str = "client_name";
/// Field holding the internal Slack channel id, when one is mapped.
pub const INTERNAL_CHANNEL_FIELD: &str = "channel_id_internal";
/// Field flagging partnership records.
pub const PARTNERSHIP_FIELD: &str = "is_partnership";

/// One project row. Unknown fields are kept in `fields` as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: ProjectId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProjectRecord {
    pub fn new(id: impl Into<ProjectId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Resolve a dotted path such as `stats.last_active`.
    ///
    /// `id` resolves to the record id even though it is not in `fields`.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if path == "id" {
            return Some(Value::String(self.id.clone()));
        }
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_FIELD).and_then(Value::as_str)
    }

    pub fn internal_channel_present(&self) -> bool {
        matches!(
            self.get(INTERNAL_CHANNEL_FIELD),
            Some(Value::String(channel)) if !channel.trim().is_empty()
        )
    }

    pub fn is_partnership(&self) -> bool {
        matches!(self.get(PARTNERSHIP_FIELD), Some(Value::Bool(true)))
    }

    /// Shallow-merge `patch` into the record. The id never changes.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<ProjectId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "project id must be a string or number, got {}",
            other
        ))),
    }
}
