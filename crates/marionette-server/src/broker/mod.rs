//! Command/ack broker.
//!
//! Owns the room table, the pending-command table, and the per-session
//! offline queues. Every public operation and every retry-timer callback
//! takes the state lock once and runs to completion without awaiting, so
//! operations never interleave.
//!
//! Command lifecycle, realized through table membership:
//!
//! ```text
//! handle_command ─┬─ avatars present ──► DISPATCHED (timer armed) ─┬─ ack ─────────► ACKED
//!                 │                           ▲                     ├─ timer, retry ─┘ (or QUEUED)
//!                 │                           │                     └─ timer, done ──► FAILED
//!                 └─ no avatar ──► QUEUED ────┘ (avatar joins)
//! host leaves while pending ──► ABANDONED      queue overflow ──► EVICTED
//! ```

pub mod client;
pub(crate) mod pending;
pub mod queue;
pub mod room;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use marionette_core::constants::{
    DEFAULT_ACK_MAX_RETRIES, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_MAX_QUEUE_SIZE,
};
use marionette_core::ids::command_id;
use marionette_core::{AckMessage, CommandMessage, Message, SessionId, StateMessage, now_ms};
use marionette_settings::BrokerSettings;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::{
    BROKER_ACK_TIMEOUTS_TOTAL, BROKER_ACKS_TOTAL, BROKER_COMMANDS_TOTAL, BROKER_DISPATCHES_TOTAL,
    BROKER_QUEUE_EVICTIONS_TOTAL, BROKER_STATES_TOTAL,
};

pub use client::Client;
use pending::{PendingCommand, PendingKey, RetryTimer};
use queue::OfflineQueue;
use room::RoomTable;

/// Delivery tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
    /// How long to wait for an ack before the next attempt.
    pub ack_timeout: Duration,
    /// Retries after the initial dispatch.
    pub ack_max_retries: u32,
    /// Offline queue capacity per session.
    pub max_queue_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
            ack_max_retries: DEFAULT_ACK_MAX_RETRIES,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

impl From<&BrokerSettings> for BrokerConfig {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
            ack_max_retries: settings.ack_max_retries,
            max_queue_size: settings.max_queue_size,
        }
    }
}

/// Snapshot of broker table sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Live rooms.
    pub rooms: usize,
    /// Members across all rooms.
    pub clients: usize,
    /// Pending commands (in flight or queued).
    pub pending: usize,
    /// Queued commands across all sessions.
    pub queued: usize,
}

#[derive(Default)]
struct BrokerState {
    rooms: RoomTable,
    pending: HashMap<PendingKey, PendingCommand>,
    queues: HashMap<SessionId, OfflineQueue>,
    next_generation: u64,
}

impl BrokerState {
    /// Remove `id` from `session`'s queue, dropping the queue if emptied.
    fn dequeue(&mut self, session: &SessionId, id: &str) {
        if let Some(queue) = self.queues.get_mut(session) {
            let _ = queue.remove(id);
            if queue.is_empty() {
                let _ = self.queues.remove(session);
            }
        }
    }

    /// Remove a pending entry and any queue slot it holds.
    fn take_pending(&mut self, session: &SessionId, id: &str) -> Option<PendingCommand> {
        let entry = self.pending.remove(&key(session, id))?;
        self.dequeue(session, id);
        Some(entry)
    }
}

fn key(session: &SessionId, id: &str) -> PendingKey {
    (session.clone(), id.to_owned())
}

struct BrokerInner {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
}

/// The broker. Cheap to clone; all clones share one set of tables.
///
/// Operations that may arm a retry timer must run inside a Tokio runtime.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Create a broker with empty tables.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                state: Mutex::new(BrokerState::default()),
            }),
        }
    }

    /// Delivery tuning in effect.
    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Add `client` to its session's room.
    ///
    /// An avatar joining drains the session's offline queue in FIFO order.
    pub fn join(&self, client: Client) {
        let mut state = self.inner.state.lock();
        let session = client.session.clone();
        let is_avatar = client.is_avatar();
        let created = state.rooms.insert(client.clone());
        info!(
            client_id = %client.id,
            role = %client.role,
            session = %session,
            room_created = created,
            "client joined"
        );
        if is_avatar {
            self.flush_queue(&mut state, &session);
        }
    }

    /// Remove `client` from its room and abandon every command it is
    /// waiting on. No ack is sent for abandoned commands.
    pub fn leave(&self, client: &Client) {
        let mut state = self.inner.state.lock();
        let was_member = state.rooms.remove(client);

        let abandoned: Vec<PendingKey> = state
            .pending
            .iter()
            .filter(|(_, entry)| entry.host.id == client.id)
            .map(|(key, _)| key.clone())
            .collect();
        for (session, id) in &abandoned {
            let _ = state.take_pending(session, id);
            debug!(session = %session, id = %id, "abandon");
        }

        info!(
            client_id = %client.id,
            role = %client.role,
            session = %client.session,
            was_member,
            abandoned = abandoned.len(),
            "client left"
        );
    }

    /// Accept a command from a host.
    ///
    /// The session always comes from the host's client record. A missing id
    /// is generated and a missing timestamp defaults to now. A pending entry
    /// with the same id in the same session is replaced; ids never collide
    /// across sessions.
    pub fn handle_command(&self, host: &Client, message: CommandMessage) {
        if !host.is_host() {
            return;
        }

        let id = message.id().map_or_else(command_id, ToOwned::to_owned);
        let command = CommandMessage {
            id: Some(id.clone()),
            session: host.session.to_string(),
            timestamp: Some(message.timestamp.unwrap_or_else(now_ms)),
            ..message
        };
        let frame = match Message::Command(command.clone()).to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(session = %host.session, id = %id, error = %e, "failed to serialize command");
                return;
            }
        };
        counter!(BROKER_COMMANDS_TOTAL).increment(1);

        let mut state = self.inner.state.lock();
        if state.take_pending(&host.session, &id).is_some() {
            debug!(session = %host.session, id = %id, "replaced pending command with same id");
        }
        let _ = state.pending.insert(
            key(&host.session, &id),
            PendingCommand::new(command, frame, host.clone()),
        );

        if !self.dispatch(&mut state, &host.session, &id) {
            debug!(
                session = %host.session,
                id = %id,
                reason = "no_avatar_connected",
                "queue"
            );
            self.enqueue(&mut state, &host.session, id);
        }
    }

    /// Match an avatar's ack to its pending command and forward it to the
    /// originating host. Unknown ids and acks from other sessions are no-ops.
    pub fn handle_ack(&self, avatar: &Client, ack: AckMessage) {
        if !avatar.is_avatar() {
            return;
        }

        let mut state = self.inner.state.lock();
        let Some(entry) = state.take_pending(&avatar.session, &ack.id) else {
            debug!(session = %avatar.session, id = %ack.id, "ack for unknown command");
            return;
        };
        drop(state);

        let ok = ack.ok;
        let normalized = AckMessage {
            version: Some(ack.version.unwrap_or(entry.command.version)),
            timestamp: Some(ack.timestamp.unwrap_or_else(now_ms)),
            ..ack
        };
        send_message(&entry.host, &Message::Ack(normalized));
        counter!(BROKER_ACKS_TOTAL).increment(1);
        info!(
            session = %entry.host.session,
            id = entry.id(),
            ok,
            attempts = entry.attempts,
            "ack"
        );
    }

    /// Fan an avatar's state snapshot out to every host in its room.
    ///
    /// Nothing is queued or retried; with no host present this is a no-op.
    pub fn handle_state(&self, avatar: &Client, message: StateMessage) {
        if !avatar.is_avatar() {
            return;
        }

        let scene = message.scene.clone();
        let payload = StateMessage {
            session: avatar.session.to_string(),
            timestamp: Some(message.timestamp.unwrap_or_else(now_ms)),
            ..message
        };
        let frame = match Message::State(payload).to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(session = %avatar.session, error = %e, "failed to serialize state");
                return;
            }
        };

        let state = self.inner.state.lock();
        let Some(room) = state.rooms.get(&avatar.session) else {
            return;
        };
        let mut targets = 0_usize;
        for host in room.hosts() {
            if !host.send(frame.clone()) {
                warn!(client_id = %host.id, session = %avatar.session, "failed to send state to host");
            }
            targets += 1;
        }
        counter!(BROKER_STATES_TOTAL).increment(1);
        debug!(
            session = %avatar.session,
            scene = scene.as_deref().unwrap_or("unknown"),
            targets,
            "state"
        );
    }

    /// Number of pending commands (in flight or queued).
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Whether `session` has a pending entry for `id`.
    pub fn is_pending(&self, session: &SessionId, id: &str) -> bool {
        self.inner.state.lock().pending.contains_key(&key(session, id))
    }

    /// Dispatch attempts so far for `id` in `session`.
    pub fn attempts(&self, session: &SessionId, id: &str) -> Option<u32> {
        self.inner
            .state
            .lock()
            .pending
            .get(&key(session, id))
            .map(|e| e.attempts)
    }

    /// Whether `id` in `session` currently has an armed retry timer.
    pub fn has_timer(&self, session: &SessionId, id: &str) -> bool {
        self.inner
            .state
            .lock()
            .pending
            .get(&key(session, id))
            .is_some_and(|e| e.timer.is_some())
    }

    /// Queued command ids for `session`, oldest first.
    pub fn queued(&self, session: &SessionId) -> Vec<String> {
        self.inner
            .state
            .lock()
            .queues
            .get(session)
            .map(|q| q.iter().map(ToOwned::to_owned).collect())
            .unwrap_or_default()
    }

    /// Members currently joined to `session`.
    pub fn room_size(&self, session: &SessionId) -> usize {
        self.inner
            .state
            .lock()
            .rooms
            .get(session)
            .map_or(0, room::Room::len)
    }

    /// Table sizes.
    pub fn stats(&self) -> BrokerStats {
        let state = self.inner.state.lock();
        BrokerStats {
            rooms: state.rooms.room_count(),
            clients: state.rooms.client_count(),
            pending: state.pending.len(),
            queued: state.queues.values().map(OfflineQueue::len).sum(),
        }
    }

    /// Send the pending command `id` to every avatar in its room and arm a
    /// fresh retry timer. Returns `false` if no avatar is present.
    fn dispatch(&self, state: &mut BrokerState, session: &SessionId, id: &str) -> bool {
        let BrokerState {
            rooms,
            pending,
            next_generation,
            ..
        } = state;
        let Some(entry) = pending.get_mut(&key(session, id)) else {
            return false;
        };
        let Some(room) = rooms.get(session) else {
            return false;
        };

        let mut targets = 0_usize;
        for avatar in room.avatars() {
            if !avatar.send(entry.frame.clone()) {
                warn!(client_id = %avatar.id, id, "failed to send command to avatar");
            }
            targets += 1;
        }
        if targets == 0 {
            return false;
        }

        entry.attempts += 1;
        *next_generation += 1;
        entry.timer = Some(self.arm_timer(key(session, id), *next_generation));
        counter!(BROKER_DISPATCHES_TOTAL).increment(1);
        debug!(
            session = %entry.host.session,
            id,
            action = %entry.command.action,
            attempts = entry.attempts,
            targets,
            "dispatch"
        );
        true
    }

    /// Append `id` to `session`'s offline queue, evicting the oldest
    /// entries past capacity. Evicted commands leave the pending table.
    fn enqueue(&self, state: &mut BrokerState, session: &SessionId, id: String) {
        let capacity = self.inner.config.max_queue_size;
        let queue = state
            .queues
            .entry(session.clone())
            .or_insert_with(|| OfflineQueue::new(capacity));
        let evicted = queue.push(id);
        if queue.is_empty() {
            let _ = state.queues.remove(session);
        }
        for old in evicted {
            if state.pending.remove(&key(session, &old)).is_some() {
                counter!(BROKER_QUEUE_EVICTIONS_TOTAL).increment(1);
                warn!(session = %session, id = %old, "offline queue full, dropped oldest command");
            }
        }
    }

    /// Dispatch every queued command for `session` in FIFO order.
    fn flush_queue(&self, state: &mut BrokerState, session: &SessionId) {
        let Some(queue) = state.queues.remove(session) else {
            return;
        };
        info!(session = %session, count = queue.len(), "flush");
        for id in queue.into_ids() {
            if !state.pending.contains_key(&key(session, &id)) {
                continue;
            }
            if !self.dispatch(state, session, &id) {
                self.enqueue(state, session, id);
            }
        }
    }

    fn arm_timer(&self, (session, id): PendingKey, generation: u64) -> RetryTimer {
        let weak: Weak<BrokerInner> = Arc::downgrade(&self.inner);
        let delay = self.inner.config.ack_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                Broker { inner }.on_ack_timeout(&session, &id, generation);
            }
        });
        RetryTimer::new(generation, task.abort_handle())
    }

    /// Retry-timer callback.
    fn on_ack_timeout(&self, session: &SessionId, id: &str, generation: u64) {
        let mut state = self.inner.state.lock();
        let Some(entry) = state.pending.get_mut(&key(session, id)) else {
            return;
        };
        if entry.timer.as_ref().map(|t| t.generation) != Some(generation) {
            return;
        }
        entry.timer = None;

        if entry.attempts > self.inner.config.ack_max_retries {
            let Some(entry) = state.take_pending(session, id) else {
                return;
            };
            drop(state);
            let ack = AckMessage::timed_out(id, entry.command.version, now_ms());
            send_message(&entry.host, &Message::Ack(ack));
            counter!(BROKER_ACK_TIMEOUTS_TOTAL).increment(1);
            warn!(
                session = %entry.host.session,
                id,
                attempts = entry.attempts,
                "ack_timeout"
            );
            return;
        }

        debug!(session = %session, id, attempts = entry.attempts, "ack_retry");
        if !self.dispatch(&mut state, session, id) {
            self.enqueue(&mut state, session, id.to_owned());
        }
    }
}

fn send_message(client: &Client, message: &Message) {
    match message.to_json() {
        Ok(json) => {
            if !client.send(Arc::new(json)) {
                warn!(client_id = %client.id, kind = message.kind(), "failed to send frame");
            }
        }
        Err(e) => warn!(kind = message.kind(), error = %e, "failed to serialize frame"),
    }
}
