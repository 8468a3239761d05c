//! Core types shared by the bingo relay crates.
//!
//! Nothing in here performs I/O. Time and randomness are reached through the
//! [`env::Environment`] trait so the server logic can run against a simulated
//! clock and seeded RNG in tests, and against the system in production.
//!
//! # Components
//!
//! - [`env::Environment`]: time and randomness abstraction
//! - [`ConnectionId`] / [`RoomId`]: opaque identifiers, hex-encoded on the wire
//! - [`GameType`]: board variants and the number range each one accepts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod game;
mod ids;

pub use game::{GameType, UnknownGameType};
pub use ids::{ConnectionId, IdParseError, RoomId};
