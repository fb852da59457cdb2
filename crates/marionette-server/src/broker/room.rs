//! Session rooms: session id → live members.
//!
//! The table has exactly two mutating operations, [`RoomTable::insert`] and
//! [`RoomTable::remove`]. A room exists only while it has at least one member.

use std::collections::HashMap;

use marionette_core::{ClientId, SessionId};

use super::client::Client;

/// Live members of one session, in join order.
#[derive(Debug, Default)]
pub struct Room {
    members: Vec<Client>,
}

impl Room {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Avatar members.
    pub fn avatars(&self) -> impl Iterator<Item = &Client> {
        self.members.iter().filter(|c| c.is_avatar())
    }

    /// Host members.
    pub fn hosts(&self) -> impl Iterator<Item = &Client> {
        self.members.iter().filter(|c| c.is_host())
    }

    /// Whether a client with `id` is a member.
    pub fn contains(&self, id: &ClientId) -> bool {
        self.members.iter().any(|c| &c.id == id)
    }
}

/// Session id → room mapping.
#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: HashMap<SessionId, Room>,
}

impl RoomTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `client` to its session's room, creating the room if needed.
    ///
    /// A member with the same client id is replaced. Returns `true` if the
    /// room was created by this call.
    pub fn insert(&mut self, client: Client) -> bool {
        let created = !self.rooms.contains_key(&client.session);
        let room = self.rooms.entry(client.session.clone()).or_default();
        room.members.retain(|c| c.id != client.id);
        room.members.push(client);
        created
    }

    /// Remove `client` from its session's room, deleting the room if it
    /// becomes empty. Returns `true` if the client was a member.
    pub fn remove(&mut self, client: &Client) -> bool {
        let Some(room) = self.rooms.get_mut(&client.session) else {
            return false;
        };
        let before = room.members.len();
        room.members.retain(|c| c.id != client.id);
        let removed = room.members.len() != before;
        if room.members.is_empty() {
            let _ = self.rooms.remove(&client.session);
        }
        removed
    }

    /// The room for `session`, if any member is present.
    pub fn get(&self, session: &SessionId) -> Option<&Room> {
        self.rooms.get(session)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members across all rooms.
    pub fn client_count(&self) -> usize {
        self.rooms.values().map(Room::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use marionette_core::Role;
    use tokio::sync::mpsc;

    use crate::websocket::connection::ClientConnection;

    fn client(id: &str, role: Role, session: &str) -> Client {
        let (tx, _rx) = mpsc::channel(4);
        let conn = Arc::new(ClientConnection::new(ClientId::from(id), tx));
        Client::new(conn, role, SessionId::from(session))
    }

    #[test]
    fn first_insert_creates_room() {
        let mut table = RoomTable::new();
        assert!(table.insert(client("h1", Role::Host, "s1")));
        assert!(!table.insert(client("a1", Role::Avatar, "s1")));
        assert_eq!(table.room_count(), 1);
        assert_eq!(table.get(&SessionId::from("s1")).unwrap().len(), 2);
    }

    #[test]
    fn removing_last_member_deletes_room() {
        let mut table = RoomTable::new();
        let host = client("h1", Role::Host, "s1");
        let _ = table.insert(host.clone());
        assert!(table.remove(&host));
        assert!(table.get(&SessionId::from("s1")).is_none());
        assert_eq!(table.room_count(), 0);
    }

    #[test]
    fn room_survives_while_members_remain() {
        let mut table = RoomTable::new();
        let host = client("h1", Role::Host, "s1");
        let avatar = client("a1", Role::Avatar, "s1");
        let _ = table.insert(host.clone());
        let _ = table.insert(avatar);
        assert!(table.remove(&host));
        let room = table.get(&SessionId::from("s1")).unwrap();
        assert_eq!(room.len(), 1);
        assert_eq!(room.avatars().count(), 1);
        assert_eq!(room.hosts().count(), 0);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut table = RoomTable::new();
        let _ = table.insert(client("h1", Role::Host, "s1"));
        assert!(!table.remove(&client("h2", Role::Host, "s1")));
        assert!(!table.remove(&client("h1", Role::Host, "s2")));
        assert_eq!(table.client_count(), 1);
    }

    #[test]
    fn reinsert_same_id_replaces() {
        let mut table = RoomTable::new();
        let _ = table.insert(client("a1", Role::Avatar, "s1"));
        let _ = table.insert(client("a1", Role::Avatar, "s1"));
        assert_eq!(table.client_count(), 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let mut table = RoomTable::new();
        let _ = table.insert(client("h1", Role::Host, "s1"));
        let _ = table.insert(client("a1", Role::Avatar, "s2"));
        assert_eq!(table.room_count(), 2);
        assert_eq!(
            table.get(&SessionId::from("s1")).unwrap().avatars().count(),
            0
        );
        assert!(
            table
                .get(&SessionId::from("s2"))
                .unwrap()
                .contains(&ClientId::from("a1"))
        );
    }
}
