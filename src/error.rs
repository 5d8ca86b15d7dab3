//! Error types for the SmartPlate control plane.
//!
//! Plain enums with hand-written `Display`. Dispatcher errors double as
//! the client-visible message text, so their `Display` output is part of
//! the wire contract.

use core::fmt;

use crate::rpc::session::ClientId;

// ---------------------------------------------------------------------------
// Dispatch errors (surfaced to the originating client)
// ---------------------------------------------------------------------------

/// A malformed or unserviceable inbound message.
///
/// Rendered into `{"type":"error","message": <Display>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    InvalidJson,
    MissingAction,
    UnknownAction(String),
    MessageTooLarge,
    RateLimited,
    /// `controlUpdate` without an object in `data`.
    MissingData,
    /// A patch field had the wrong type or an unknown mode name.
    InvalidControlData,
    InvalidRampRate,
    MissingExperiment,
    MissingExperimentOrNotes,
    NoteNotFound,
    NoteSaveFailed,
    NoteListFailed,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "Invalid JSON"),
            Self::MissingAction => write!(f, "Missing action field"),
            Self::UnknownAction(name) => write!(f, "Unknown action: {name}"),
            Self::MessageTooLarge => write!(f, "Message too large"),
            Self::RateLimited => write!(f, "Rate limit exceeded"),
            Self::MissingData => write!(f, "Missing or invalid data field"),
            Self::InvalidControlData => write!(f, "Invalid control data"),
            Self::InvalidRampRate => write!(f, "Invalid ramp_rate"),
            Self::MissingExperiment => write!(f, "Missing experiment parameter"),
            Self::MissingExperimentOrNotes => write!(f, "Missing experiment or notes parameter"),
            Self::NoteNotFound => write!(f, "Note not found"),
            Self::NoteSaveFailed => write!(f, "Failed to save note"),
            Self::NoteListFailed => write!(f, "Failed to list notes"),
        }
    }
}

// ---------------------------------------------------------------------------
// Note store errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum NoteError {
    /// Name is empty or contains characters outside `[A-Za-z0-9_-]`.
    InvalidName,
    /// Body exceeds the store's size limit.
    TooLarge { len: usize, max: usize },
    NotFound,
    Io(std::io::Error),
}

impl fmt::Display for NoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid note name"),
            Self::TooLarge { len, max } => write!(f, "note too large ({len} > {max} bytes)"),
            Self::NotFound => write!(f, "note not found"),
            Self::Io(e) => write!(f, "note I/O: {e}"),
        }
    }
}

impl From<std::io::Error> for NoteError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum TransportError {
    /// No open connection for this client.
    UnknownClient(ClientId),
    /// Some recipients of a broadcast could not be written to.
    PartialDelivery { failed: usize },
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClient(id) => write!(f, "unknown client {id}"),
            Self::PartialDelivery { failed } => write!(f, "broadcast failed for {failed} client(s)"),
            Self::Io(e) => write!(f, "transport I/O: {e}"),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(std::io::Error),
    /// Document is not valid JSON for [`ControllerConfig`](crate::config::ControllerConfig).
    Malformed,
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O: {e}"),
            Self::Malformed => write!(f, "config malformed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}
impl std::error::Error for NoteError {}
impl std::error::Error for TransportError {}
impl std::error::Error for ConfigError {}
