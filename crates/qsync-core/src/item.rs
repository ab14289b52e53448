//! Job records returned by the list endpoints.
//!
//! Items are replaced wholesale on every successful sync; nothing here is
//! patched field by field. Unknown class-specific fields are kept in `extra`
//! so callers can still render them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One file inside an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFile {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
}

/// A job record belonging to exactly one resource class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<ItemFile>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub download_state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    /// Account the record belongs to; numeric or string upstream.
    #[serde(default, deserialize_with = "string_or_number")]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Minimal record, mostly useful for optimistic inserts and tests.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: false,
            size: 0,
            files: Vec::new(),
            created_at: None,
            download_state: None,
            progress: 0.0,
            auth_id: None,
            hash: None,
            extra: Map::new(),
        }
    }

    /// True while the item waits for a free active slot.
    pub fn is_queued(&self) -> bool {
        self.download_state
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("queued"))
    }

    pub fn file(&self, file_id: u64) -> Option<&ItemFile> {
        self.files.iter().find(|f| f.id == file_id)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
