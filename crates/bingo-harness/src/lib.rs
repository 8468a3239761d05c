//! Deterministic simulation harness for bingo relay testing.
//!
//! [`SimEnv`] gives the driver a manual clock and a seeded RNG, so the same
//! seed and the same inputs always produce the same room ids and the same
//! outbound messages. [`SimServer`] executes the driver's actions in memory,
//! collecting every message a connection would have received in its inbox.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks room and registry properties against a
//! [`SystemSnapshot`] taken from the driver. Use
//! [`InvariantRegistry::standard()`] after every operation in randomized
//! tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    CapacityBound, ConnectionState, Invariant, InvariantRegistry, InvariantResult,
    MembershipConsistency, NoEmptyRooms, RoomState, SingleConnectedHost, SystemSnapshot,
    UniqueCalledNumbers, Violation,
};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::SimServer;
