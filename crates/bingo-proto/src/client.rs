//! Client → server messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Peer-connection negotiation step carried by the signaling relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// SDP offer
    Offer,
    /// SDP answer
    Answer,
    /// ICE candidate
    Candidate,
}

impl SignalKind {
    /// Wire name of the message kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
        }
    }
}

/// A decoded inbound frame.
///
/// Identifiers arrive as strings and are parsed by the handler, so a
/// well-formed request naming a room that cannot exist still gets a
/// `NOT_FOUND` reply instead of being dropped as malformed. The same goes for
/// `gameType`, which is validated against the known variants by the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room and become its host.
    CreateRoom {
        /// Board variant name (`75ball`, `90ball`, `30ball`, `pattern`,
        /// `coverall`)
        game_type: String,
        /// Optional display name for the room
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
        /// Optional member limit; server default applies when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity: Option<usize>,
    },

    /// Join an existing room.
    JoinRoom {
        /// Room to join
        room_id: String,
    },

    /// Leave a room.
    LeaveRoom {
        /// Room to leave
        room_id: String,
    },

    /// Start (or restart) the game in the sender's room. Host only.
    StartGame {},

    /// Stop the game in the sender's room. Host only.
    StopGame {},

    /// Call a number in the sender's room. Host only.
    NumberCall {
        /// Ball to call
        number: i64,
    },

    /// Set display name and player profile.
    Register {
        /// Display name
        name: String,
        /// Contact phone number
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
        /// Stake placed on the game
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stake: Option<u64>,
        /// Selected board/card number
        #[serde(default, skip_serializing_if = "Option::is_none")]
        board: Option<u32>,
        /// Payment method or reference
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payment: Option<String>,
    },

    /// SDP offer for another connection.
    Offer {
        /// Receiving connection
        target_id: String,
        /// Opaque negotiation payload
        payload: Value,
    },

    /// SDP answer for another connection.
    Answer {
        /// Receiving connection
        target_id: String,
        /// Opaque negotiation payload
        payload: Value,
    },

    /// ICE candidate for another connection.
    Candidate {
        /// Receiving connection
        target_id: String,
        /// Opaque negotiation payload
        payload: Value,
    },

    /// Chat line for the sender's room.
    Chat {
        /// Message text
        text: String,
        /// Room the sender believes it is in
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },

    /// Ask for the list of open rooms.
    ListRooms {},

    /// A `type` this server does not understand. Never produced by serde;
    /// [`crate::decode`] builds it after the typed decode fails.
    #[serde(skip)]
    Unknown {
        /// The unrecognized `type` value
        kind: String,
    },
}

impl ClientMessage {
    /// Every `type` value the server understands.
    pub const KINDS: &'static [&'static str] = &[
        "createRoom",
        "joinRoom",
        "leaveRoom",
        "startGame",
        "stopGame",
        "numberCall",
        "register",
        "offer",
        "answer",
        "candidate",
        "chat",
        "listRooms",
    ];

    /// Wire name of this message, used in logs and error replies.
    pub fn kind(&self) -> &str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::StartGame {} => "startGame",
            Self::StopGame {} => "stopGame",
            Self::NumberCall { .. } => "numberCall",
            Self::Register { .. } => "register",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Chat { .. } => "chat",
            Self::ListRooms {} => "listRooms",
            Self::Unknown { kind } => kind,
        }
    }

    /// Signaling kind, target and payload if this is a relay message.
    pub fn signal(&self) -> Option<(SignalKind, &str, &Value)> {
        match self {
            Self::Offer { target_id, payload } => Some((SignalKind::Offer, target_id, payload)),
            Self::Answer { target_id, payload } => Some((SignalKind::Answer, target_id, payload)),
            Self::Candidate { target_id, payload } => {
                Some((SignalKind::Candidate, target_id, payload))
            },
            _ => None,
        }
    }
}
