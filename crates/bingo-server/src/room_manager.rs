//! Room Manager
//!
//! Owns every active room: membership, host, board variant and the called
//! numbers of the current game. This is the only place host authority is
//! checked, so a non-host can never inject calls or start and stop games no
//! matter what the client claims.
//!
//! Operations that change membership take the [`ConnectionRegistry`] as well,
//! so a connection's `room_id` back-reference moves in the same step as the
//! room's member list.
//!
//! # Invariants
//!
//! - A room with at least one member has exactly one host, and the host is a
//!   member.
//! - A room never holds more than `capacity` members.
//! - A room whose last member leaves is removed in that same call.
//! - `called_numbers` has no duplicates and only shrinks when a game starts.

use std::{collections::HashMap, time::Duration};

use bingo_core::{ConnectionId, GameType, RoomId, UnknownGameType, env::Environment};
use bingo_proto::{ErrorCode, RoomSummary};

use crate::registry::ConnectionRegistry;

/// Which remaining member inherits the host role when the host leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostSelection {
    /// Member who has been in the room longest.
    #[default]
    EarliestJoined,
    /// Member who joined most recently.
    LatestJoined,
}

/// Limits and tie-breaks applied to every room.
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    /// Largest capacity a creator may ask for
    pub max_capacity: usize,
    /// Host hand-off rule
    pub host_selection: HostSelection,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self { max_capacity: 100, host_selection: HostSelection::default() }
    }
}

/// Where a room is in its game lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No game running. Numbers from a previous game may still be listed.
    Lobby,
    /// Host is calling numbers.
    InProgress,
}

/// A bingo session shared by a set of connections.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct Room<I> {
    id: RoomId,
    name: Option<String>,
    host_id: ConnectionId,
    /// Join order. Host hand-off depends on it.
    members: Vec<ConnectionId>,
    game_type: GameType,
    called_numbers: Vec<u8>,
    game_active: bool,
    capacity: usize,
    created_at: I,
}

impl<I: Copy> Room<I> {
    /// Room id.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Optional display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current host.
    pub fn host_id(&self) -> ConnectionId {
        self.host_id
    }

    /// Members in join order.
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    /// Whether `id` is a member.
    pub fn is_member(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    /// Board variant.
    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    /// Numbers called this game, in call order.
    pub fn called_numbers(&self) -> &[u8] {
        &self.called_numbers
    }

    /// Whether a game is in progress.
    pub fn game_active(&self) -> bool {
        self.game_active
    }

    /// Lifecycle phase derived from `game_active`.
    pub fn phase(&self) -> GamePhase {
        if self.game_active { GamePhase::InProgress } else { GamePhase::Lobby }
    }

    /// Member limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// When the room was created.
    pub fn created_at(&self) -> I {
        self.created_at
    }

    /// Point-in-time copy of the room state.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id,
            name: self.name.clone(),
            game_type: self.game_type,
            host_id: self.host_id,
            members: self.members.clone(),
            called_numbers: self.called_numbers.clone(),
            game_active: self.game_active,
            capacity: self.capacity,
        }
    }

    /// Entry for a room listing.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id,
            room_name: self.name.clone(),
            game_type: self.game_type,
            members: self.members.len(),
            capacity: self.capacity,
            game_active: self.game_active,
        }
    }
}

/// Room state handed to a joining connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room id
    pub room_id: RoomId,
    /// Optional display name
    pub name: Option<String>,
    /// Board variant
    pub game_type: GameType,
    /// Current host
    pub host_id: ConnectionId,
    /// Members in join order
    pub members: Vec<ConnectionId>,
    /// Numbers called this game
    pub called_numbers: Vec<u8>,
    /// Whether a game is in progress
    pub game_active: bool,
    /// Member limit
    pub capacity: usize,
}

/// State changes the driver turns into outbound messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A connection joined; existing members should hear about it.
    PlayerJoined {
        /// Room
        room_id: RoomId,
        /// New member
        player: ConnectionId,
    },

    /// A member left; remaining members should hear about it.
    PlayerLeft {
        /// Room
        room_id: RoomId,
        /// Departed member
        player: ConnectionId,
    },

    /// The host left and another member took over.
    HostChanged {
        /// Room
        room_id: RoomId,
        /// New host
        host_id: ConnectionId,
    },

    /// The last member left and the room was deleted. Nobody is left to tell.
    RoomClosed {
        /// Deleted room
        room_id: RoomId,
    },

    /// The host called a number.
    NumberCalled {
        /// Room
        room_id: RoomId,
        /// Ball called
        number: u8,
        /// All numbers called this game
        called_numbers: Vec<u8>,
    },

    /// A game started with an empty call list.
    GameStarted {
        /// Room
        room_id: RoomId,
    },

    /// The game stopped; calls are kept.
    GameStopped {
        /// Room
        room_id: RoomId,
        /// Calls made in the stopped game
        called_numbers: Vec<u8>,
    },
}

/// Errors from RoomManager operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Room does not exist
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Connection is not in any room
    #[error("connection {0} is not in a room")]
    NotInRoom(ConnectionId),

    /// Connection is unknown or already disconnected
    #[error("connection {0} is not connected")]
    ConnectionNotFound(ConnectionId),

    /// Caller is not the room host
    #[error("only the host can {action}")]
    Unauthorized {
        /// What was attempted
        action: &'static str,
    },

    /// Room is at capacity
    #[error("room {room_id} is full ({capacity} players)")]
    Full {
        /// Room
        room_id: RoomId,
        /// Its member limit
        capacity: usize,
    },

    /// Number already called this game
    #[error("number {0} has already been called")]
    Duplicate(u8),

    /// Connection must leave its current room first
    #[error("already in room {0}; leave it first")]
    AlreadyInRoom(RoomId),

    /// Board variant not recognized
    #[error(transparent)]
    UnknownGameType(#[from] UnknownGameType),

    /// Requested capacity outside `1..=max`
    #[error("capacity must be between 1 and {max}, got {requested}")]
    InvalidCapacity {
        /// Requested capacity
        requested: usize,
        /// Upper bound
        max: usize,
    },

    /// Number outside the board variant's range
    #[error("{number} is not a valid {game_type} number (1-{max})", max = game_type.max_number())]
    NumberOutOfRange {
        /// Rejected number
        number: i64,
        /// Room's board variant
        game_type: GameType,
    },

    /// No game in progress
    #[error("no game in progress in room {0}")]
    NotActive(RoomId),
}

impl RoomError {
    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) | Self::NotInRoom(_) => ErrorCode::NotFound,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Full { .. } => ErrorCode::Full,
            Self::Duplicate(_) => ErrorCode::Duplicate,
            Self::AlreadyInRoom(_) => ErrorCode::AlreadyInRoom,
            Self::ConnectionNotFound(_)
            | Self::UnknownGameType(_)
            | Self::InvalidCapacity { .. }
            | Self::NumberOutOfRange { .. } => ErrorCode::InvalidRequest,
            Self::NotActive(_) => ErrorCode::NotActive,
        }
    }
}

/// Tracks active rooms and enforces host authority.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
pub struct RoomManager<I = std::time::Instant> {
    /// Room ID → room
    rooms: HashMap<RoomId, Room<I>>,
    /// Capacity bound and host hand-off rule
    policy: RoomPolicy,
}

impl<I: Copy> RoomManager<I> {
    /// Create a RoomManager with the given policy.
    pub fn new(policy: RoomPolicy) -> Self {
        Self { rooms: HashMap::new(), policy }
    }

    /// Check if a room exists
    pub fn has_room(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Room by id.
    pub fn room(&self, room_id: RoomId) -> Option<&Room<I>> {
        self.rooms.get(&room_id)
    }

    /// All rooms, in no particular order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room<I>> {
        self.rooms.values()
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of a room; empty if the room does not exist.
    pub fn members(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.rooms.get(&room_id).into_iter().flat_map(|r| r.members.iter().copied())
    }

    /// Active policy.
    pub fn policy(&self) -> &RoomPolicy {
        &self.policy
    }

    /// Create a room with `creator` as host and sole member.
    pub fn create_room<E: Environment<Instant = I>>(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        creator: ConnectionId,
        game_type: &str,
        name: Option<String>,
        capacity: usize,
        env: &E,
    ) -> Result<RoomId, RoomError> {
        let current_room =
            registry.connected(creator).ok_or(RoomError::ConnectionNotFound(creator))?.room_id;
        let game_type: GameType = game_type.parse()?;

        if capacity == 0 || capacity > self.policy.max_capacity {
            return Err(RoomError::InvalidCapacity {
                requested: capacity,
                max: self.policy.max_capacity,
            });
        }

        if let Some(room_id) = current_room {
            return Err(RoomError::AlreadyInRoom(room_id));
        }

        let room_id = self.fresh_room_id(env);
        let room = Room {
            id: room_id,
            name,
            host_id: creator,
            members: vec![creator],
            game_type,
            called_numbers: Vec::new(),
            game_active: false,
            capacity,
            created_at: env.now(),
        };
        self.rooms.insert(room_id, room);
        registry.set_room(creator, Some(room_id));

        Ok(room_id)
    }

    /// Add a connection to a room.
    ///
    /// Joining the room the connection is already in returns the snapshot
    /// again without any event.
    pub fn join_room(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(RoomSnapshot, Vec<RoomEvent>), RoomError> {
        let current_room = registry
            .connected(connection_id)
            .ok_or(RoomError::ConnectionNotFound(connection_id))?
            .room_id;

        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound(room_id))?;

        match current_room {
            Some(current) if current == room_id && room.is_member(connection_id) => {
                return Ok((room.snapshot(), Vec::new()));
            },
            Some(current) => return Err(RoomError::AlreadyInRoom(current)),
            None => {},
        }

        if room.members.len() >= room.capacity {
            return Err(RoomError::Full { room_id, capacity: room.capacity });
        }

        room.members.push(connection_id);
        registry.set_room(connection_id, Some(room_id));

        Ok((room.snapshot(), vec![RoomEvent::PlayerJoined { room_id, player: connection_id }]))
    }

    /// Remove a connection from a room.
    ///
    /// A no-op returning no events if the connection is not a member. When the
    /// host leaves, the replacement is picked in the same call; when the last
    /// member leaves, the room is deleted.
    pub fn leave_room(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Vec<RoomEvent> {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return Vec::new();
        };
        let Some(position) = room.members.iter().position(|&m| m == connection_id) else {
            return Vec::new();
        };

        room.members.remove(position);
        if registry.room_of(connection_id) == Some(room_id) {
            registry.set_room(connection_id, None);
        }

        if room.members.is_empty() {
            self.rooms.remove(&room_id);
            return vec![RoomEvent::RoomClosed { room_id }];
        }

        let mut events = vec![RoomEvent::PlayerLeft { room_id, player: connection_id }];

        if room.host_id == connection_id {
            if let Some(next_host) = pick_host(&room.members, self.policy.host_selection, registry)
            {
                room.host_id = next_host;
                events.push(RoomEvent::HostChanged { room_id, host_id: next_host });
            }
        }

        events
    }

    /// Record a number call by the host.
    pub fn record_call(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        number: i64,
    ) -> Result<RoomEvent, RoomError> {
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound(room_id))?;

        if room.host_id != connection_id {
            return Err(RoomError::Unauthorized { action: "call numbers" });
        }
        if !room.game_active {
            return Err(RoomError::NotActive(room_id));
        }

        let game_type = room.game_type;
        let ball = game_type.ball(number).ok_or(RoomError::NumberOutOfRange { number, game_type })?;

        if room.called_numbers.contains(&ball) {
            return Err(RoomError::Duplicate(ball));
        }

        room.called_numbers.push(ball);
        Ok(RoomEvent::NumberCalled {
            room_id,
            number: ball,
            called_numbers: room.called_numbers.clone(),
        })
    }

    /// Start a new game, clearing previous calls. Restarting a running game is
    /// allowed and also clears calls.
    pub fn start_game(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<RoomEvent, RoomError> {
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound(room_id))?;

        if room.host_id != connection_id {
            return Err(RoomError::Unauthorized { action: "start the game" });
        }

        room.called_numbers.clear();
        room.game_active = true;
        Ok(RoomEvent::GameStarted { room_id })
    }

    /// Stop the running game, keeping its calls.
    pub fn stop_game(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<RoomEvent, RoomError> {
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound(room_id))?;

        if room.host_id != connection_id {
            return Err(RoomError::Unauthorized { action: "stop the game" });
        }
        if !room.game_active {
            return Err(RoomError::NotActive(room_id));
        }

        room.game_active = false;
        Ok(RoomEvent::GameStopped { room_id, called_numbers: room.called_numbers.clone() })
    }

    /// Listing of every room.
    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self.rooms.values().map(Room::summary).collect();
        summaries.sort_by_key(|s| s.room_id);
        summaries
    }

    fn fresh_room_id<E: Environment<Instant = I>>(&self, env: &E) -> RoomId {
        loop {
            let candidate = RoomId::new(env.random_u64());
            if candidate.get() != 0 && !self.rooms.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl<I> RoomManager<I>
where
    I: Copy + std::ops::Sub<Output = Duration>,
{
    /// Remove empty rooms older than `max_age`.
    ///
    /// Only touches rooms that already have no members, so it never races a
    /// join. Returns the removed ids.
    pub fn sweep_idle_rooms(&mut self, now: I, max_age: Duration) -> Vec<RoomId> {
        let idle: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|r| r.members.is_empty() && now - r.created_at >= max_age)
            .map(|r| r.id)
            .collect();

        for room_id in &idle {
            self.rooms.remove(room_id);
        }
        idle
    }
}

/// Choose the next host among the remaining members, preferring connected
/// ones.
fn pick_host<I>(
    members: &[ConnectionId],
    selection: HostSelection,
    registry: &ConnectionRegistry<I>,
) -> Option<ConnectionId> {
    let mut connected = members.iter().copied().filter(|&m| registry.is_connected(m));
    let preferred = match selection {
        HostSelection::EarliestJoined => connected.next(),
        HostSelection::LatestJoined => connected.last(),
    };

    let fallback = match selection {
        HostSelection::EarliestJoined => members.first(),
        HostSelection::LatestJoined => members.last(),
    };

    preferred.or(fallback.copied())
}

impl<I: Copy> Default for RoomManager<I> {
    fn default() -> Self {
        Self::new(RoomPolicy::default())
    }
}

impl<I> std::fmt::Debug for RoomManager<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomManager")
            .field("room_count", &self.rooms.len())
            .field("policy", &self.policy)
            .finish()
    }
}
