//! Commands awaiting acknowledgement.

use std::sync::Arc;

use marionette_core::{CommandMessage, SessionId};
use tokio::task::AbortHandle;

use super::client::Client;

/// Pending-table key. Command ids are only unique within a session.
pub(crate) type PendingKey = (SessionId, String);

/// The single live retry timer of a pending command.
///
/// Dropping the timer aborts its task, so removing a [`PendingCommand`] from
/// the table always cancels its timer.
#[derive(Debug)]
pub(crate) struct RetryTimer {
    pub(crate) generation: u64,
    handle: AbortHandle,
}

impl RetryTimer {
    pub(crate) fn new(generation: u64, handle: AbortHandle) -> Self {
        Self { generation, handle }
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A command that has been accepted but not yet acked, failed, or abandoned.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    /// Normalized command (id, session, and timestamp filled in).
    pub(crate) command: CommandMessage,
    /// Serialized `cmd` frame, reused for every attempt.
    pub(crate) frame: Arc<String>,
    /// Originating host.
    pub(crate) host: Client,
    /// Dispatches so far.
    pub(crate) attempts: u32,
    /// Armed while the command is in flight; `None` while queued.
    pub(crate) timer: Option<RetryTimer>,
}

impl PendingCommand {
    pub(crate) fn new(command: CommandMessage, frame: Arc<String>, host: Client) -> Self {
        Self {
            command,
            frame,
            host,
            attempts: 0,
            timer: None,
        }
    }

    /// Command id; always filled in before the entry is stored.
    pub(crate) fn id(&self) -> &str {
        self.command.id.as_deref().unwrap_or_default()
    }
}
