//! TCP transport: newline-delimited JSON, one client per connection.
//!
//! ```text
//!  accept thread ──▶ register client ──▶ reader thread per client
//!                                              │
//!                                              ▼
//!                                        InboundQueue
//!
//!  send / broadcast ──▶ registry (write half, bounded write timeout)
//! ```
//!
//! A failed write drops that client only. Reader threads notify the
//! session loop on disconnect so it can release the client's session.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;

use crate::error::{DispatchError, TransportError};
use crate::rpc::channels::InboundQueue;
use crate::rpc::protocol::{MAX_MESSAGE_LEN, Reply};
use crate::rpc::session::ClientId;
use crate::rpc::transport::Transport;

/// Maximum number of concurrent clients.
pub const MAX_CLIENTS: usize = 8;

/// Upper bound on a single blocking write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Read limit per line: one byte over the message bound so oversized
/// lines reach the dispatcher and get a proper error reply.
const LINE_LIMIT: u64 = MAX_MESSAGE_LEN as u64 + 1;

type Registry = Mutex<HashMap<ClientId, TcpStream>>;

pub struct TcpTransport {
    clients: Arc<Registry>,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind `addr` and start accepting clients in the background.
    pub fn bind(addr: &str, inbound: Arc<InboundQueue>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Self::from_listener(listener, inbound)
    }

    /// Start accepting on an already-bound listener.
    pub fn from_listener(listener: TcpListener, inbound: Arc<InboundQueue>) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let clients: Arc<Registry> = Arc::new(Mutex::new(HashMap::new()));
        let registry = Arc::clone(&clients);
        thread::Builder::new()
            .name("tcp-accept".into())
            .spawn(move || accept_loop(&listener, &registry, &inbound))?;
        info!("[tcp] listening on {local_addr}");
        Ok(Self {
            clients,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    fn send(&self, client_id: ClientId, text: &str) -> Result<(), TransportError> {
        let mut clients = self.clients.lock();
        let stream = clients
            .get_mut(&client_id)
            .ok_or(TransportError::UnknownClient(client_id))?;
        if let Err(e) = write_line(stream, text) {
            drop_client(&mut clients, client_id);
            return Err(TransportError::Io(e));
        }
        Ok(())
    }

    fn broadcast(&self, text: &str) -> Result<(), TransportError> {
        let mut clients = self.clients.lock();
        let failed: Vec<ClientId> = clients
            .iter_mut()
            .filter_map(|(id, stream)| write_line(stream, text).err().map(|_| *id))
            .collect();
        for id in &failed {
            drop_client(&mut clients, *id);
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TransportError::PartialDelivery {
                failed: failed.len(),
            })
        }
    }

    fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    fn is_connected(&self, client_id: ClientId) -> bool {
        self.clients.lock().contains_key(&client_id)
    }
}

// ── Internals ────────────────────────────────────────────────

fn write_line(stream: &mut TcpStream, text: &str) -> io::Result<()> {
    stream.write_all(text.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()
}

fn drop_client(clients: &mut HashMap<ClientId, TcpStream>, client_id: ClientId) {
    if let Some(stream) = clients.remove(&client_id) {
        warn!("[tcp] dropping client {client_id} after write failure");
        let _ = stream.shutdown(Shutdown::Both);
    }
}

fn accept_loop(listener: &TcpListener, clients: &Arc<Registry>, inbound: &Arc<InboundQueue>) {
    let next_id = AtomicU32::new(1);
    for conn in listener.incoming() {
        let stream = match conn {
            Ok(s) => s,
            Err(e) => {
                warn!("[tcp] accept failed: {e}");
                continue;
            }
        };
        if let Err(e) = register(stream, &next_id, clients, inbound) {
            warn!("[tcp] client setup failed: {e}");
        }
    }
}

fn register(
    stream: TcpStream,
    next_id: &AtomicU32,
    clients: &Arc<Registry>,
    inbound: &Arc<InboundQueue>,
) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    if clients.lock().len() >= MAX_CLIENTS {
        warn!("[tcp] rejecting {peer}: {MAX_CLIENTS} clients already connected");
        return stream.shutdown(Shutdown::Both);
    }
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    stream.set_nodelay(true)?;
    let reader = stream.try_clone()?;
    let client_id = next_id.fetch_add(1, Ordering::Relaxed);

    clients.lock().insert(client_id, stream);
    info!("[tcp] client {client_id} connected from {peer}");

    let registry = Arc::clone(clients);
    let inbound = Arc::clone(inbound);
    let spawned = thread::Builder::new()
        .name(format!("tcp-client-{client_id}"))
        .spawn(move || {
            read_loop(reader, client_id, &registry, &inbound);
            if let Some(stream) = registry.lock().remove(&client_id) {
                let _ = stream.shutdown(Shutdown::Both);
            }
            inbound.notify_disconnect(client_id);
            info!("[tcp] client {client_id} disconnected");
        });
    if let Err(e) = spawned {
        if let Some(stream) = clients.lock().remove(&client_id) {
            let _ = stream.shutdown(Shutdown::Both);
        }
        return Err(e);
    }
    Ok(())
}

fn read_loop(
    stream: TcpStream,
    client_id: ClientId,
    clients: &Registry,
    inbound: &InboundQueue,
) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = match (&mut reader).take(LINE_LIMIT).read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                warn!("[tcp] client {client_id} read failed: {e}");
                return;
            }
        };
        if n as u64 == LINE_LIMIT && line.last() != Some(&b'\n') {
            if let Err(e) = skip_rest_of_line(&mut reader) {
                warn!("[tcp] client {client_id} read failed: {e}");
                return;
            }
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            warn!("[tcp] client {client_id} sent a line that is not UTF-8");
            reply_invalid_json(clients, client_id);
            continue;
        };
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            continue;
        }
        if let Err(dropped) = inbound.push(client_id, text.to_owned()) {
            warn!(
                "[tcp] inbound queue full, dropping {} bytes from client {client_id}",
                dropped.text.len()
            );
        }
    }
}

/// Answer a line that is not UTF-8; the inbound queue only carries text.
fn reply_invalid_json(clients: &Registry, client_id: ClientId) {
    let text = Reply::error(&DispatchError::InvalidJson).to_json();
    let mut clients = clients.lock();
    if let Some(stream) = clients.get_mut(&client_id) {
        if write_line(stream, &text).is_err() {
            drop_client(&mut clients, client_id);
        }
    }
}

fn skip_rest_of_line(reader: &mut impl BufRead) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}
