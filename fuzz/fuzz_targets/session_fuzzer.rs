//! Fuzz target for whole sessions against the driver
//!
//! Interleaves connects, disconnects, ticks and client frames (well-formed
//! and garbage) across a handful of connections.
//!
//! # Invariants
//!
//! - No room exceeds its capacity
//! - Every room has a member as host, preferring a connected one
//! - No empty rooms survive a leave
//! - Registry and room membership agree
//! - Called numbers are unique and in range

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use bingo_harness::{InvariantRegistry, SimServer};
use bingo_server::DriverConfig;
use libfuzzer_sys::fuzz_target;
use serde_json::json;

#[derive(Debug, Arbitrary)]
struct Session {
    seed: u64,
    max_capacity: u8,
    steps: Vec<Step>,
}

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Disconnect { who: u8 },
    Tick { secs: u8 },
    Create { who: u8, game: u8, capacity: Option<u8> },
    Join { who: u8, room: u8 },
    Leave { who: u8, room: u8 },
    Start { who: u8 },
    Stop { who: u8 },
    Call { who: u8, number: i16 },
    Signal { who: u8, target: u8 },
    Raw { who: u8, text: String },
}

const GAME_TYPES: &[&str] = &["75ball", "90ball", "30ball", "pattern", "coverall", "keno"];

fuzz_target!(|session: Session| {
    let config = DriverConfig {
        max_connections: 16,
        max_capacity: usize::from(session.max_capacity % 8) + 1,
        default_capacity: 1,
        ..Default::default()
    };
    let mut server = SimServer::with_config(session.seed, config);
    let invariants = InvariantRegistry::standard();
    let mut ids = Vec::new();

    for step in session.steps.iter().take(256) {
        let pick = |i: u8| (!ids.is_empty()).then(|| ids[usize::from(i) % ids.len()]);
        let rooms: Vec<_> = server.snapshot().rooms.iter().map(|r| r.id).collect();
        let pick_room = |i: u8| rooms.get(usize::from(i) % rooms.len().max(1)).copied();

        let frame = match *step {
            Step::Connect => {
                ids.push(server.connect());
                None
            },
            Step::Disconnect { who } => {
                if let Some(id) = pick(who) {
                    server.disconnect(id);
                }
                None
            },
            Step::Tick { secs } => {
                server.advance(Duration::from_secs(u64::from(secs)));
                server.tick();
                None
            },
            Step::Create { who, game, capacity } => pick(who).map(|id| {
                let game_type = GAME_TYPES[usize::from(game) % GAME_TYPES.len()];
                (id, json!({"type": "createRoom", "gameType": game_type, "capacity": capacity}))
            }),
            Step::Join { who, room } => pick(who).map(|id| {
                (id, json!({"type": "joinRoom", "roomId": pick_room(room).map(|r| r.to_string()).unwrap_or_default()}))
            }),
            Step::Leave { who, room } => pick(who).map(|id| {
                (id, json!({"type": "leaveRoom", "roomId": pick_room(room).map(|r| r.to_string()).unwrap_or_default()}))
            }),
            Step::Start { who } => pick(who).map(|id| (id, json!({"type": "startGame"}))),
            Step::Stop { who } => pick(who).map(|id| (id, json!({"type": "stopGame"}))),
            Step::Call { who, number } => {
                pick(who).map(|id| (id, json!({"type": "numberCall", "number": number})))
            },
            Step::Signal { who, target } => pick(who).zip(pick(target)).map(|(from, to)| {
                (from, json!({"type": "offer", "targetId": to, "payload": {"sdp": "x"}}))
            }),
            Step::Raw { who, ref text } => {
                if let Some(id) = pick(who) {
                    let _ = server.send_raw(id, text);
                }
                None
            },
        };

        if let Some((id, frame)) = frame {
            // Closed connections are rejected with an error; that is fine here
            let _ = server.send_json(id, &frame);
        }

        if let Err(violations) = invariants.check_all(&server.snapshot()) {
            panic!("after {step:?}: {violations:?}");
        }
    }
});
