//! Per-client session bookkeeping: inbound rate limiting.
//!
//! Every connected client gets its own token bucket (10 messages per
//! second, burst of 10) so one chatty client cannot starve the session
//! loop. Sessions are created on first message and dropped on disconnect.

use std::collections::HashMap;

use burster::Limiter;
use core::time::Duration;
use log::warn;

/// Transport-assigned client identifier.
pub type ClientId = u32;

// ── Session ──────────────────────────────────────────────────

/// Tracks a single client.
pub struct Session {
    rate_limiter: burster::TokenBucket<fn() -> Duration>,
    /// Messages accepted so far.
    pub accepted: u64,
    /// Messages rejected by the limiter so far.
    pub rejected: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            rate_limiter: burster::TokenBucket::new_with_time_provider(
                10,
                10, // 10 tokens per second, 10 burst capacity
                platform_now as fn() -> Duration,
            ),
            accepted: 0,
            rejected: 0,
        }
    }

    /// Consume one rate-limit token; returns `false` when exhausted.
    pub fn check_rate_limit(&mut self) -> bool {
        if self.rate_limiter.try_consume(1).is_ok() {
            self.accepted += 1;
            true
        } else {
            self.rejected += 1;
            false
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ── Session table ────────────────────────────────────────────

/// Sessions keyed by client.
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<ClientId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `client_id`, created on first use.
    pub fn get_or_insert(&mut self, client_id: ClientId) -> &mut Session {
        self.sessions.entry(client_id).or_default()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    /// Admit one message from `client_id`.
    pub fn admit(&mut self, client_id: ClientId) -> bool {
        let ok = self.get_or_insert(client_id).check_rate_limit();
        if !ok {
            warn!("[session] client {client_id} rate limited");
        }
        ok
    }

    /// Forget a client (e.g. on disconnect).
    pub fn remove(&mut self, client_id: ClientId) {
        self.sessions.remove(&client_id);
    }

    /// Keep only the sessions for which `keep` returns `true`. Returns how
    /// many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(ClientId) -> bool) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, _| keep(*id));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ── Platform time for rate limiter ───────────────────────────

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────
