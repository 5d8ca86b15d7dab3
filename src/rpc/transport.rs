//! Transport abstraction: any message-oriented text channel.
//!
//! Concrete implementations:
//! - TCP, newline-delimited JSON ([`TcpTransport`](crate::adapters::tcp_transport::TcpTransport))
//! - [`NullTransport`] when nothing is listening
//!
//! Inbound frames do not come through this trait: adapters push them
//! into the [`InboundQueue`](super::channels::InboundQueue) from their
//! own reader threads. Sends are called without the state lock held.

use crate::error::TransportError;

use super::session::ClientId;

/// Outbound half of a client transport.
pub trait Transport: Send + Sync {
    /// Send one message to one client.
    fn send(&self, client_id: ClientId, text: &str) -> Result<(), TransportError>;

    /// Send one message to every connected client. A failure for one
    /// client must not prevent delivery to the others.
    fn broadcast(&self, text: &str) -> Result<(), TransportError>;

    /// Number of currently connected clients.
    fn client_count(&self) -> usize;

    /// Whether `client_id` is still connected.
    fn is_connected(&self, client_id: ClientId) -> bool;
}

/// A null transport that has no clients and discards everything.
/// Useful as a default when no listener is configured.
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, client_id: ClientId, _text: &str) -> Result<(), TransportError> {
        Err(TransportError::UnknownClient(client_id))
    }

    fn broadcast(&self, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn client_count(&self) -> usize {
        0
    }

    fn is_connected(&self, _client_id: ClientId) -> bool {
        false
    }
}
