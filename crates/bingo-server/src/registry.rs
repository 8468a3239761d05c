//! Connection registry.
//!
//! Tracks every connection the server has accepted and the ephemeral identity
//! assigned to it. Ids come from a monotonic counter so one is never handed
//! out twice within a process, even after its record has been reaped.
//!
//! A closed socket is first marked disconnected and only reaped after a grace
//! window, so a signaling message already in flight towards it resolves to
//! "not connected" rather than to a missing record. A stale id presented after
//! reaping is simply "not found".

use std::{collections::HashMap, time::Duration};

use bingo_core::{ConnectionId, RoomId};

/// Optional details a player supplies with `register`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Contact phone number
    pub phone: Option<String>,
    /// Stake placed on the game
    pub stake: Option<u64>,
    /// Selected board/card number
    pub board: Option<u32>,
    /// Payment method or reference
    pub payment: Option<String>,
}

/// Information about a registered connection.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct Connection<I> {
    /// Identity assigned at accept time
    pub id: ConnectionId,
    /// Display name; a generated placeholder until the player registers
    pub display_name: String,
    /// Room this connection is a member of. A lookup key, not ownership.
    pub room_id: Option<RoomId>,
    /// False once the socket has closed
    pub connected: bool,
    /// Registration details
    pub profile: Profile,
    /// When the connection was accepted
    pub connected_at: I,
    /// When the socket closed, if it has
    pub disconnected_at: Option<I>,
}

/// Registry of live (and recently closed) connections.
#[derive(Debug)]
pub struct ConnectionRegistry<I> {
    /// Connection ID → record
    connections: HashMap<ConnectionId, Connection<I>>,
    /// Next id to hand out
    next_id: u64,
}

impl<I> Default for ConnectionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> ConnectionRegistry<I> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self { connections: HashMap::new(), next_id: 1 }
    }

    /// Hand out the next id without creating a record.
    ///
    /// Used for sockets that are turned away, so they can still be named in
    /// logs without sharing an id with anything else.
    pub fn allocate_id(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Allocate a fresh identity for a newly accepted socket.
    pub fn register(&mut self, now: I) -> ConnectionId {
        let id = self.allocate_id();

        let connection = Connection {
            id,
            display_name: format!("Player-{}", id.get()),
            room_id: None,
            connected: true,
            profile: Profile::default(),
            connected_at: now,
            disconnected_at: None,
        };
        self.connections.insert(id, connection);
        id
    }

    /// Connection record. `None` if never registered or already reaped.
    pub fn lookup(&self, id: ConnectionId) -> Option<&Connection<I>> {
        self.connections.get(&id)
    }

    /// Mutable connection record.
    pub fn lookup_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<I>> {
        self.connections.get_mut(&id)
    }

    /// Record exists and its socket is still open.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).is_some_and(|c| c.connected)
    }

    /// Connected record, or `None` if unknown or closed.
    pub fn connected(&self, id: ConnectionId) -> Option<&Connection<I>> {
        self.connections.get(&id).filter(|c| c.connected)
    }

    /// Flip `connected` to false and stamp the disconnect time.
    ///
    /// Returns `true` only on the first call for a connected record, so a
    /// second close for the same socket is a no-op.
    pub fn mark_disconnected(&mut self, id: ConnectionId, now: I) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) if conn.connected => {
                conn.connected = false;
                conn.disconnected_at = Some(now);
                true
            },
            _ => false,
        }
    }

    /// Remove a record. Idempotent.
    pub fn reap(&mut self, id: ConnectionId) -> Option<Connection<I>> {
        self.connections.remove(&id)
    }

    /// Update the room back-reference.
    ///
    /// Returns `false` if the connection is unknown.
    pub fn set_room(&mut self, id: ConnectionId, room_id: Option<RoomId>) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => {
                conn.room_id = room_id;
                true
            },
            None => false,
        }
    }

    /// Room the connection is currently in.
    pub fn room_of(&self, id: ConnectionId) -> Option<RoomId> {
        self.connections.get(&id).and_then(|c| c.room_id)
    }

    /// Display name, or `None` if the record is gone.
    pub fn display_name(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id).map(|c| c.display_name.as_str())
    }

    /// All records, connected or not.
    pub fn iter(&self) -> impl Iterator<Item = &Connection<I>> {
        self.connections.values()
    }

    /// Number of open connections.
    pub fn connected_count(&self) -> usize {
        self.connections.values().filter(|c| c.connected).count()
    }

    /// Total number of records, including disconnected ones awaiting reap.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// No records at all.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<I> ConnectionRegistry<I>
where
    I: Copy + std::ops::Sub<Output = Duration>,
{
    /// Reap every disconnected record whose grace window has elapsed.
    ///
    /// Returns the reaped ids.
    pub fn reap_expired(&mut self, now: I, grace: Duration) -> Vec<ConnectionId> {
        let expired: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.disconnected_at.is_some_and(|at| now - at >= grace))
            .map(|c| c.id)
            .collect();

        for id in &expired {
            self.connections.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Plain durations stand in for instants.
    type Registry = ConnectionRegistry<Duration>;

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();

        let id = registry.register(at(0));
        let conn = registry.lookup(id).unwrap();

        assert!(conn.connected);
        assert!(conn.room_id.is_none());
        assert_eq!(conn.display_name, format!("Player-{}", id.get()));
        assert!(registry.is_connected(id));
        assert!(registry.lookup(ConnectionId::new(999)).is_none());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = Registry::new();

        let first = registry.register(at(0));
        registry.mark_disconnected(first, at(1));
        registry.reap(first);

        let second = registry.register(at(2));
        assert_ne!(first, second);
    }

    #[test]
    fn allocated_ids_are_skipped_by_register() {
        let mut registry = Registry::new();

        let rejected = registry.allocate_id();
        let accepted = registry.register(at(0));

        assert_ne!(rejected, accepted);
        assert!(registry.lookup(rejected).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mark_disconnected_keeps_record() {
        let mut registry = Registry::new();
        let id = registry.register(at(0));

        assert!(registry.mark_disconnected(id, at(5)));

        let conn = registry.lookup(id).unwrap();
        assert!(!conn.connected);
        assert_eq!(conn.disconnected_at, Some(at(5)));
        assert!(!registry.is_connected(id));
        assert!(registry.connected(id).is_none());
        assert_eq!(registry.connected_count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mark_disconnected_twice_is_noop() {
        let mut registry = Registry::new();
        let id = registry.register(at(0));

        assert!(registry.mark_disconnected(id, at(5)));
        assert!(!registry.mark_disconnected(id, at(9)));
        assert_eq!(registry.lookup(id).unwrap().disconnected_at, Some(at(5)));

        assert!(!registry.mark_disconnected(ConnectionId::new(404), at(9)));
    }

    #[test]
    fn reap_is_idempotent() {
        let mut registry = Registry::new();
        let id = registry.register(at(0));

        assert!(registry.reap(id).is_some());
        assert!(registry.reap(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn reap_expired_respects_grace() {
        let mut registry = Registry::new();
        let early = registry.register(at(0));
        let late = registry.register(at(0));
        let live = registry.register(at(0));

        registry.mark_disconnected(early, at(10));
        registry.mark_disconnected(late, at(25));

        let reaped = registry.reap_expired(at(40), Duration::from_secs(30));
        assert_eq!(reaped, vec![early]);
        assert!(registry.lookup(late).is_some());
        assert!(registry.lookup(live).is_some());

        let reaped = registry.reap_expired(at(55), Duration::from_secs(30));
        assert_eq!(reaped, vec![late]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn set_room_tracks_back_reference() {
        let mut registry = Registry::new();
        let id = registry.register(at(0));
        let room = RoomId::new(7);

        assert!(registry.set_room(id, Some(room)));
        assert_eq!(registry.room_of(id), Some(room));

        assert!(registry.set_room(id, None));
        assert_eq!(registry.room_of(id), None);

        assert!(!registry.set_room(ConnectionId::new(404), Some(room)));
    }
}
