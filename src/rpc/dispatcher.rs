//! Command dispatcher: turns inbound JSON messages into state changes.
//!
//! **Transport-decoupled**: the dispatcher does not own a transport.
//! Callers feed `(client_id, text)` via [`CommandDispatcher::dispatch`]
//! and get back an [`Outbound`] describing what to send. Delivery happens
//! in [`CommandDispatcher::deliver`], after every lock has been released.
//!
//! Every message passes through a short pipeline:
//!
//! 1. **Rate limiting**: per-client token bucket (via `burster`).
//! 2. **Envelope parse**: size bound, JSON, `action` string.
//! 3. **Action lookup**: case-insensitive binary search over [`ACTIONS`].
//! 4. **Handler**: copies what it needs under the state lock, then
//!    builds its reply from the copy.

use log::{debug, info, warn};

use crate::app::events::ControllerEvent;
use crate::app::ports::Actuator;
use crate::context::Context;
use crate::error::{DispatchError, NoteError};
use crate::state::ControlPatch;

use super::protocol::{Reply, Request};
use super::session::{ClientId, SessionTable};

// ── Action table ─────────────────────────────────────────────

/// Every action the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ClearFault,
    ControlUpdate,
    GetConfig,
    GetEvents,
    GetHistory,
    NotepadList,
    NotepadLoad,
    NotepadSave,
    ResetSystem,
}

/// Lookup table keyed by lowercase name. Must stay sorted and unique.
pub static ACTIONS: [(&str, Action); 9] = [
    ("clearfault", Action::ClearFault),
    ("controlupdate", Action::ControlUpdate),
    ("getconfig", Action::GetConfig),
    ("getevents", Action::GetEvents),
    ("gethistory", Action::GetHistory),
    ("notepadlist", Action::NotepadList),
    ("notepadload", Action::NotepadLoad),
    ("notepadsave", Action::NotepadSave),
    ("resetsystem", Action::ResetSystem),
];

impl Action {
    /// Case-insensitive lookup.
    pub fn lookup(name: &str) -> Option<Self> {
        let key = name.to_ascii_lowercase();
        ACTIONS
            .binary_search_by(|(k, _)| (*k).cmp(key.as_str()))
            .ok()
            .map(|i| ACTIONS[i].1)
    }

    /// Canonical wire spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::ClearFault => "clearFault",
            Self::ControlUpdate => "controlUpdate",
            Self::GetConfig => "getConfig",
            Self::GetEvents => "getEvents",
            Self::GetHistory => "getHistory",
            Self::NotepadList => "notepadList",
            Self::NotepadLoad => "notepadLoad",
            Self::NotepadSave => "notepadSave",
            Self::ResetSystem => "resetSystem",
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────

/// Result of dispatching one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbound {
    /// Sent to the originating client only.
    pub reply: Option<Reply>,
    /// Sent to every connected client.
    pub broadcast: Option<Reply>,
    /// Ask the host to restart once the reply is out.
    pub restart: bool,
}

impl Outbound {
    fn reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            ..Self::default()
        }
    }

    fn error(err: &DispatchError) -> Self {
        Self::reply(Reply::error(err))
    }

    /// Nothing to send (lock timeout).
    pub fn is_empty(&self) -> bool {
        self.reply.is_none() && self.broadcast.is_none() && !self.restart
    }
}

type HandlerResult = Result<Option<Outbound>, DispatchError>;

// ── Dispatcher ───────────────────────────────────────────────

/// Owns per-client sessions; borrows everything else from the [`Context`]
/// for the duration of one call.
#[derive(Default)]
pub struct CommandDispatcher {
    sessions: SessionTable,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Forget a disconnected client's session.
    pub fn disconnect(&mut self, client_id: ClientId) {
        self.sessions.remove(client_id);
    }

    /// Handle one inbound message.
    ///
    /// Validation failures come back as an error reply to the sender. A
    /// lock timeout yields an empty [`Outbound`]: the message is dropped
    /// and logged, never reported to the client.
    pub fn dispatch<A: Actuator>(
        &mut self,
        ctx: &Context<A>,
        client_id: ClientId,
        text: &str,
    ) -> Outbound {
        if !self.sessions.admit(client_id) {
            return Outbound::error(&DispatchError::RateLimited);
        }

        let request = match Request::parse(text) {
            Ok(r) => r,
            Err(e) => {
                warn!("[rpc] client {client_id}: {e}");
                return Outbound::error(&e);
            }
        };

        let Some(action) = Action::lookup(&request.action) else {
            warn!("[rpc] client {client_id}: unknown action '{}'", request.action);
            return Outbound::error(&DispatchError::UnknownAction(request.action));
        };
        debug!("[rpc] client {client_id}: {}", action.name());

        let result = match action {
            Action::ControlUpdate => handle_control_update(ctx, &request),
            Action::GetHistory => handle_get_history(ctx),
            Action::GetEvents => handle_get_events(ctx),
            Action::GetConfig => handle_get_config(ctx),
            Action::NotepadList => handle_notepad_list(ctx),
            Action::NotepadLoad => handle_notepad_load(ctx, &request),
            Action::NotepadSave => handle_notepad_save(ctx, &request),
            Action::ResetSystem => Ok(Some(Outbound {
                reply: Some(Reply::ack("Restarting")),
                restart: true,
                ..Outbound::default()
            })),
            Action::ClearFault => handle_clear_fault(ctx),
        };

        match result {
            Ok(Some(out)) => out,
            Ok(None) => {
                warn!(
                    "[rpc] {} from client {client_id} dropped: state lock timeout",
                    action.name()
                );
                Outbound::default()
            }
            Err(e) => {
                warn!("[rpc] {} from client {client_id}: {e}", action.name());
                Outbound::error(&e)
            }
        }
    }

    /// Send what [`dispatch`](Self::dispatch) produced. Must be called
    /// with no lock held. Transport failures are logged and otherwise
    /// ignored.
    pub fn deliver<A: Actuator>(ctx: &Context<A>, client_id: ClientId, out: &Outbound) {
        if let Some(reply) = &out.reply {
            if let Err(e) = ctx.transport.send(client_id, &reply.to_json()) {
                warn!("[rpc] reply to client {client_id} failed: {e}");
            }
        }
        if let Some(push) = &out.broadcast {
            if let Err(e) = ctx.transport.broadcast(&push.to_json()) {
                warn!("[rpc] broadcast failed: {e}");
            }
        }
        if out.restart {
            info!("[rpc] restart requested by client {client_id}");
            ctx.system.request_restart();
        }
    }

    /// Drain the inbound queue: disconnect notices first, then every
    /// pending message. Returns the number of messages handled.
    ///
    /// Sessions of clients the transport no longer has are dropped too,
    /// since disconnect notices can be lost when their channel is full.
    pub fn service<A: Actuator>(&mut self, ctx: &Context<A>) -> usize {
        while let Some(client_id) = ctx.inbound.pop_disconnect() {
            self.disconnect(client_id);
        }
        let stale = self.sessions.retain(|id| ctx.transport.is_connected(id));
        if stale > 0 {
            debug!("[rpc] pruned {stale} stale session(s)");
        }
        let mut handled = 0;
        while let Some(msg) = ctx.inbound.pop() {
            let out = self.dispatch(ctx, msg.client_id, &msg.text);
            Self::deliver(ctx, msg.client_id, &out);
            handled += 1;
        }
        handled
    }
}

// ── Handlers ─────────────────────────────────────────────────

fn handle_control_update<A: Actuator>(ctx: &Context<A>, request: &Request) -> HandlerResult {
    if request.data_object().is_none() {
        return Err(DispatchError::MissingData);
    }
    let patch: ControlPatch = serde_json::from_value(request.data.clone())
        .map_err(|_| DispatchError::InvalidControlData)?;
    patch.validate()?;

    let now = ctx.clock.now_ms();
    let Some(snapshot) = ctx.store.with_lock(|s| {
        s.apply_control(&patch, now);
        s.system.snapshot(now)
    }) else {
        return Ok(None);
    };
    info!(
        "[rpc] control update: mode={} setpoint={:.1}",
        snapshot.mode, snapshot.temp_setpoint
    );

    Ok(Some(Outbound {
        reply: Some(Reply::ack("Update received")),
        broadcast: Some(Reply::DataUpdate { data: snapshot }),
        restart: false,
    }))
}

fn handle_get_history<A: Actuator>(ctx: &Context<A>) -> HandlerResult {
    Ok(ctx
        .store
        .list_history_chronological()
        .map(|data| Outbound::reply(Reply::History { data })))
}

fn handle_get_events<A: Actuator>(ctx: &Context<A>) -> HandlerResult {
    Ok(ctx
        .store
        .list_events()
        .map(|data| Outbound::reply(Reply::Events { data })))
}

fn handle_get_config<A: Actuator>(ctx: &Context<A>) -> HandlerResult {
    Ok(ctx
        .store
        .with_lock(|s| s.system.config_view())
        .map(|data| Outbound::reply(Reply::Config { data })))
}

fn handle_clear_fault<A: Actuator>(ctx: &Context<A>) -> HandlerResult {
    let now = ctx.clock.now_ms();
    Ok(ctx
        .store
        .with_lock(|s| {
            if !s.actuator.has_fault() {
                return;
            }
            s.actuator.clear_fault();
            s.modes.acknowledge_fault();
            s.log(now, &ControllerEvent::FaultCleared);
        })
        .map(|()| Outbound::reply(Reply::ack("Fault cleared"))))
}

// Note handlers do blocking I/O and never touch the state lock.

fn handle_notepad_list<A: Actuator>(ctx: &Context<A>) -> HandlerResult {
    let experiments = ctx.notes.list().map_err(|e| {
        warn!("[notes] list failed: {e}");
        DispatchError::NoteListFailed
    })?;
    Ok(Some(Outbound::reply(Reply::NotepadList { experiments })))
}

fn handle_notepad_load<A: Actuator>(ctx: &Context<A>, request: &Request) -> HandlerResult {
    let experiment = request
        .data_str("experiment")
        .ok_or(DispatchError::MissingExperiment)?;
    match ctx.notes.load(experiment) {
        Ok(notes) => Ok(Some(Outbound::reply(Reply::NotepadData {
            experiment: experiment.to_owned(),
            notes,
        }))),
        Err(NoteError::NotFound) => Err(DispatchError::NoteNotFound),
        Err(e) => {
            warn!("[notes] load '{experiment}' failed: {e}");
            Err(DispatchError::NoteNotFound)
        }
    }
}

fn handle_notepad_save<A: Actuator>(ctx: &Context<A>, request: &Request) -> HandlerResult {
    let (Some(experiment), Some(notes)) =
        (request.data_str("experiment"), request.data_str("notes"))
    else {
        return Err(DispatchError::MissingExperimentOrNotes);
    };
    ctx.notes.save(experiment, notes).map_err(|e| {
        warn!("[notes] save '{experiment}' failed: {e}");
        DispatchError::NoteSaveFailed
    })?;
    Ok(Some(Outbound::reply(Reply::ack("Note saved"))))
}
