//! Bingo relay wire protocol.
//!
//! Every WebSocket text frame carries exactly one JSON object whose `type`
//! field names the message kind. Inbound frames decode into [`ClientMessage`],
//! outbound pushes are [`ServerMessage`]. Both are closed enums so adding a
//! kind is a compile error everywhere it is matched.
//!
//! # Decoding policy
//!
//! - Not JSON, no `type`, or a known `type` with bad fields:
//!   [`ProtocolError`]. The server drops the frame without replying.
//! - A `type` the server does not know: [`ClientMessage::Unknown`]. The server
//!   logs and ignores it so newer clients keep working against older servers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod codec;
mod errors;
mod server;

pub use client::{ClientMessage, SignalKind};
pub use codec::{MAX_FRAME_LEN, decode, encode};
pub use errors::{ProtocolError, Result};
pub use server::{ErrorCode, ErrorPayload, PlayerInfo, RoomSummary, ServerMessage};
