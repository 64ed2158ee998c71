//! Serializable snapshot of a suspended message.
//!
//! Handlers and phases are referenced by name; restoring a checkpoint
//! resolves them again against the running configuration.

use super::{Flow, HeaderBlock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A handler that ran, by phase and handler name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedRecord {
    pub phase: String,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCheckpoint {
    pub message_id: Uuid,
    pub flow: Flow,
    /// Phase names of the message's execution chain, in order
    pub chain: Vec<String>,
    pub current_phase_index: usize,
    pub current_handler_index: usize,
    pub executed: Vec<ExecutedRecord>,
    pub operation: Option<String>,
    pub action: Option<String>,
    pub headers: Vec<HeaderBlock>,
    pub properties: HashMap<String, Value>,
    pub paused: bool,
    pub is_fault: bool,
    pub processing_fault: bool,
    pub server_side: bool,
    pub fire_and_forget: bool,
    pub created_at: DateTime<Utc>,
}

impl ExecutionCheckpoint {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
