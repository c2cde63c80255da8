//! Sidekick state data structures

use serde::{Deserialize, Serialize};

/// Logical key: one state per chat and model pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SidekickKey {
    pub chat_id: String,
    pub model_id: String,
}

impl SidekickKey {
    pub fn new(chat_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            model_id: model_id.into(),
        }
    }

    /// Query parameters identifying this key on the wire
    pub fn query(&self) -> [(&'static str, &str); 2] {
        [("chat_id", self.chat_id.as_str()), ("model_id", self.model_id.as_str())]
    }
}

impl std::fmt::Display for SidekickKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.model_id)
    }
}

/// Opaque UI state, stored and returned as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SidekickState(pub serde_json::Value);

impl SidekickState {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for SidekickState {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
