//! Authenticated broker member.

use std::sync::Arc;

use marionette_core::{ClientId, Role, SessionId};

use crate::websocket::connection::ClientConnection;

/// A connection that passed authentication and joined a session.
#[derive(Clone)]
pub struct Client {
    /// Connection ID.
    pub id: ClientId,
    /// Role granted by the capability token.
    pub role: Role,
    /// Session granted by the capability token.
    pub session: SessionId,
    /// Outbound handle.
    pub connection: Arc<ClientConnection>,
}

impl Client {
    /// Wrap an authenticated connection.
    pub fn new(connection: Arc<ClientConnection>, role: Role, session: SessionId) -> Self {
        Self {
            id: connection.id.clone(),
            role,
            session,
            connection,
        }
    }

    /// Whether this client joined as a host.
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Whether this client joined as an avatar.
    pub fn is_avatar(&self) -> bool {
        self.role == Role::Avatar
    }

    /// Queue a serialized frame for this client.
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.connection.send(frame)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
