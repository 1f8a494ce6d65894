//! SerializedTask - the wire/persisted form of a task.

use serde::{Deserialize, Serialize};

/// Flat record `{ id, data, func }`.
///
/// `data` is the encoded payload, rendered as a sequence of byte values.
/// `func` is the function reference (registry name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedTask {
    pub id: String,
    pub data: Vec<u8>,
    pub func: String,
}

impl SerializedTask {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
