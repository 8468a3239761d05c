//! Server → client messages.

use bingo_core::{ConnectionId, GameType, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::SignalKind;

/// Stable error codes carried in `error` replies.
///
/// The UI keys its error rendering off these, so existing codes never change
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown room or target connection.
    NotFound,
    /// Non-host attempted a host-only action.
    Unauthorized,
    /// Room is at capacity.
    Full,
    /// Number was already called in this game.
    Duplicate,
    /// Connection is already a member of another room.
    AlreadyInRoom,
    /// Request is well-formed but its values are not acceptable.
    InvalidRequest,
    /// Action requires a game in progress.
    NotActive,
}

/// Body of an `error` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Create an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

/// Public view of a room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// Connection id
    pub id: ConnectionId,
    /// Display name
    pub name: String,
    /// Whether this member is the room host
    pub is_host: bool,
}

/// Entry in a `roomList` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id
    pub room_id: RoomId,
    /// Optional room name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    /// Board variant
    pub game_type: GameType,
    /// Current member count
    pub members: usize,
    /// Member limit
    pub capacity: usize,
    /// Whether a game is in progress
    pub game_active: bool,
}

/// An outbound push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome {
        /// Identity assigned to this connection
        connection_id: ConnectionId,
        /// Placeholder display name
        name: String,
    },

    /// Reply to `register`.
    Registered {
        /// Connection that registered
        connection_id: ConnectionId,
        /// Display name now in effect
        name: String,
    },

    /// Reply to `createRoom`.
    RoomCreated {
        /// New room id
        room_id: RoomId,
        /// Optional room name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
        /// Board variant
        game_type: GameType,
        /// Member limit
        capacity: usize,
        /// Host (the creator)
        host_id: ConnectionId,
    },

    /// Reply to `joinRoom`, with the full room state.
    RoomJoined {
        /// Joined room
        room_id: RoomId,
        /// Optional room name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
        /// Board variant
        game_type: GameType,
        /// Current host
        host_id: ConnectionId,
        /// Members in join order, including the joiner
        members: Vec<PlayerInfo>,
        /// Numbers called so far
        called_numbers: Vec<u8>,
        /// Whether a game is in progress
        game_active: bool,
        /// Member limit
        capacity: usize,
    },

    /// Reply to `leaveRoom`.
    RoomLeft {
        /// Room that was left
        room_id: RoomId,
    },

    /// Another member joined.
    PlayerJoined {
        /// Room
        room_id: RoomId,
        /// The new member
        player: PlayerInfo,
    },

    /// A member left or disconnected.
    PlayerLeft {
        /// Room
        room_id: RoomId,
        /// Departed member
        player_id: ConnectionId,
    },

    /// A member changed their registration.
    PlayerUpdated {
        /// Room
        room_id: RoomId,
        /// Updated member
        player: PlayerInfo,
    },

    /// Host role moved to another member.
    NewHost {
        /// Room
        room_id: RoomId,
        /// New host
        host_id: ConnectionId,
    },

    /// The host called a number.
    NumberCalled {
        /// Room
        room_id: RoomId,
        /// Ball just called
        number: u8,
        /// All numbers called this game, in call order
        called_numbers: Vec<u8>,
    },

    /// A game started; called numbers were cleared.
    GameStarted {
        /// Room
        room_id: RoomId,
    },

    /// The game stopped; called numbers are kept.
    GameStopped {
        /// Room
        room_id: RoomId,
        /// Numbers called in the stopped game
        called_numbers: Vec<u8>,
    },

    /// Chat line from a room member.
    Chat {
        /// Room
        room_id: RoomId,
        /// Sender
        from_id: ConnectionId,
        /// Sender display name at the time of sending
        name: String,
        /// Message text
        text: String,
    },

    /// Reply to `listRooms`.
    RoomList {
        /// Open rooms
        rooms: Vec<RoomSummary>,
    },

    /// Relayed SDP offer.
    Offer {
        /// Originating connection
        from_id: ConnectionId,
        /// Payload as sent by the originator
        payload: Value,
    },

    /// Relayed SDP answer.
    Answer {
        /// Originating connection
        from_id: ConnectionId,
        /// Payload as sent by the originator
        payload: Value,
    },

    /// Relayed ICE candidate.
    Candidate {
        /// Originating connection
        from_id: ConnectionId,
        /// Payload as sent by the originator
        payload: Value,
    },

    /// A request from this connection failed.
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Build the relayed form of a signaling message.
    pub fn signal(kind: SignalKind, from_id: ConnectionId, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => Self::Offer { from_id, payload },
            SignalKind::Answer => Self::Answer { from_id, payload },
            SignalKind::Candidate => Self::Candidate { from_id, payload },
        }
    }

    /// Error code if this is an `error` message.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error(payload) => Some(payload.code),
            _ => None,
        }
    }
}
