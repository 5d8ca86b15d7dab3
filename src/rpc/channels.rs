//! Inbound message channels.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge transport reader
//! threads with the session-service loop. Producers never block: a full
//! queue hands the message back to the caller.
//!
//! ```text
//! ┌──────────────┐ InboundMessage ┌────────────────┐
//! │  Transport   │──────────────▶│ Session loop    │
//! │  readers     │──────────────▶│ (dispatcher)    │
//! └──────────────┘  disconnects   └────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use super::session::ClientId;

/// Raw text frame from a client, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub client_id: ClientId,
    pub text: String,
}

/// Channel depth for inbound messages.
pub const INBOUND_DEPTH: usize = 16;

/// Channel depth for disconnect notices.
const DISCONNECT_DEPTH: usize = 8;

pub struct InboundQueue {
    messages: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH>,
    disconnects: Channel<CriticalSectionRawMutex, ClientId, DISCONNECT_DEPTH>,
}

impl InboundQueue {
    pub const fn new() -> Self {
        Self {
            messages: Channel::new(),
            disconnects: Channel::new(),
        }
    }

    /// Enqueue a frame. Returns it back when the queue is full.
    pub fn push(&self, client_id: ClientId, text: String) -> Result<(), InboundMessage> {
        self.messages
            .try_send(InboundMessage { client_id, text })
            .map_err(|TrySendError::Full(msg)| msg)
    }

    /// Next pending frame, if any.
    pub fn pop(&self) -> Option<InboundMessage> {
        self.messages.try_receive().ok()
    }

    /// Record that a client went away. Dropped when full; the session loop
    /// also prunes sessions the transport no longer knows.
    pub fn notify_disconnect(&self, client_id: ClientId) {
        let _ = self.disconnects.try_send(client_id);
    }

    pub fn pop_disconnect(&self) -> Option<ClientId> {
        self.disconnects.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}
