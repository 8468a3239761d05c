//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture rooms and connections at a point in time. Invariants
//! operate on snapshots rather than live state so every check in a pass sees
//! the same state.

use bingo_core::{ConnectionId, RoomId, env::Environment};
use bingo_server::ServerDriver;

/// Snapshot of the entire server state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Every room, sorted by id.
    pub rooms: Vec<RoomState>,
    /// Every connection record, including closed ones awaiting reap, sorted by
    /// id.
    pub connections: Vec<ConnectionState>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no rooms, no connections).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the driver's current state.
    pub fn from_driver<E: Environment>(driver: &ServerDriver<E>) -> Self {
        let mut rooms: Vec<RoomState> = driver
            .room_manager()
            .rooms()
            .map(|room| RoomState {
                id: room.id(),
                host_id: room.host_id(),
                members: room.members().to_vec(),
                capacity: room.capacity(),
                called_numbers: room.called_numbers().to_vec(),
                game_active: room.game_active(),
                max_number: room.game_type().max_number(),
            })
            .collect();
        rooms.sort_by_key(|r| r.id);

        let mut connections: Vec<ConnectionState> = driver
            .registry()
            .iter()
            .map(|conn| ConnectionState {
                id: conn.id,
                connected: conn.connected,
                room_id: conn.room_id,
            })
            .collect();
        connections.sort_by_key(|c| c.id);

        Self { rooms, connections }
    }

    /// Room by id.
    pub fn room(&self, id: RoomId) -> Option<&RoomState> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Connection by id.
    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionState> {
        self.connections.iter().find(|c| c.id == id)
    }
}

/// Snapshot of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    /// Room id
    pub id: RoomId,
    /// Current host
    pub host_id: ConnectionId,
    /// Members in join order
    pub members: Vec<ConnectionId>,
    /// Member limit
    pub capacity: usize,
    /// Numbers called this game
    pub called_numbers: Vec<u8>,
    /// Whether a game is in progress
    pub game_active: bool,
    /// Highest ball for the room's board variant
    pub max_number: u8,
}

/// Snapshot of one connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    /// Connection id
    pub id: ConnectionId,
    /// False once the socket closed
    pub connected: bool,
    /// Room back-reference
    pub room_id: Option<RoomId>,
}
