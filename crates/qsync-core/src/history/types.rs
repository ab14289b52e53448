use crate::resource::ResourceClass;

/// A link issuance to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// SHA-256 fingerprint of the API key, never the key itself.
    pub credential: String,
    pub class: ResourceClass,
    pub item_id: u64,
    pub file_id: Option<u64>,
    pub url: String,
    /// Unix milliseconds.
    pub issued_at: i64,
    pub name: Option<String>,
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub id: i64,
    pub credential: String,
    pub class: ResourceClass,
    pub item_id: u64,
    pub file_id: Option<u64>,
    pub url: String,
    pub issued_at: i64,
    pub name: Option<String>,
}
