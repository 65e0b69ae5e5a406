use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod write;

/// A client-encrypted blob plus the metadata clients use to diff their state.
///
/// The server never looks inside `encrypted_data`. Fields the client sends
/// beyond the known ones are kept in `extra` and written back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub encrypted_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, encrypted_data: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            encrypted_data: encrypted_data.into(),
            last_modified: None,
            version: None,
            extra: Map::new(),
        }
    }

    pub fn with_sync_info(mut self, last_modified: impl Into<Value>, version: impl Into<Value>) -> Self {
        self.last_modified = Some(last_modified.into());
        self.version = Some(version.into());
        self
    }

    /// `null` and `""` count as an absent payload.
    pub fn has_payload(&self) -> bool {
        match &self.encrypted_data {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn meta(&self) -> RecordMeta {
        RecordMeta {
            id: self.id.clone(),
            last_modified: self.last_modified.clone(),
            version: self.version.clone(),
        }
    }
}

/// Metadata projection of a [`Record`]; never carries the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
}
