//! Wire protocol: one JSON object per message.
//!
//! Inbound:  `{"action": <string>, "data"?: <object>}`
//! Outbound: `{"type": <kind>, ...}`; see [`Reply`].

use log::error;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::state::event_log::EventEntry;
use crate::state::history::HistoryEntry;
use crate::state::{ConfigView, StateSnapshot};

/// Largest inbound message accepted, in bytes.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

// ── Inbound ──────────────────────────────────────────────────

/// A parsed inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub action: String,
    /// `data` member, or `Value::Null` when absent.
    pub data: Value,
}

impl Request {
    /// Parse and check the envelope. The action name is not resolved here.
    pub fn parse(text: &str) -> Result<Self, DispatchError> {
        if text.len() > MAX_MESSAGE_LEN {
            return Err(DispatchError::MessageTooLarge);
        }
        let value: Value = serde_json::from_str(text).map_err(|_| DispatchError::InvalidJson)?;
        let Value::Object(mut obj) = value else {
            return Err(DispatchError::MissingAction);
        };
        let action = match obj.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Err(DispatchError::MissingAction),
        };
        let data = obj.remove("data").unwrap_or(Value::Null);
        Ok(Self { action, data })
    }

    /// `data` as an object, if it is one.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// String member of `data`.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data_object()?.get(key)?.as_str()
    }
}

// ── Outbound ─────────────────────────────────────────────────

/// Every message the controller sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reply {
    Ack { message: String },
    Error { message: String },
    History { data: Vec<HistoryEntry> },
    Events { data: Vec<EventEntry> },
    /// Unsolicited state push.
    DataUpdate { data: StateSnapshot },
    Config { data: ConfigView },
    NotepadList { experiments: Vec<String> },
    NotepadData { experiment: String, notes: String },
}

impl Reply {
    pub fn ack(message: impl Into<String>) -> Self {
        Self::Ack {
            message: message.into(),
        }
    }

    pub fn error(err: &DispatchError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }

    /// Serialise for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            error!("[rpc] reply serialisation failed: {e}");
            String::from(r#"{"type":"error","message":"Internal error"}"#)
        })
    }
}
