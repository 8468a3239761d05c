//! Property-based tests for the server driver.
//!
//! Random client operation sequences are replayed against a `SimServer` and
//! the standard invariants are checked after every step.

use std::time::Duration;

use bingo_core::{ConnectionId, RoomId};
use bingo_harness::{InvariantRegistry, SimServer, SystemSnapshot};
use bingo_proto::{ErrorCode, ServerMessage};
use bingo_server::DriverConfig;
use proptest::prelude::*;
use serde_json::json;

const GAME_TYPES: &[&str] = &["75ball", "90ball", "30ball", "pattern", "coverall", "bogus"];

/// One client-side step.
#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect(usize),
    Create { who: usize, game: usize, capacity: usize },
    Join { who: usize, room: usize },
    Leave(usize),
    Start(usize),
    Stop(usize),
    Call { who: usize, number: i64 },
    Register { who: usize, name: String },
    Signal { from: usize, to: usize },
    Chat(usize),
    Tick(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Connect),
        1 => any::<usize>().prop_map(Op::Disconnect),
        2 => (any::<usize>(), 0..GAME_TYPES.len(), 0usize..6)
            .prop_map(|(who, game, capacity)| Op::Create { who, game, capacity }),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(who, room)| Op::Join { who, room }),
        1 => any::<usize>().prop_map(Op::Leave),
        2 => any::<usize>().prop_map(Op::Start),
        1 => any::<usize>().prop_map(Op::Stop),
        5 => (any::<usize>(), -2i64..95).prop_map(|(who, number)| Op::Call { who, number }),
        1 => (any::<usize>(), "[a-z ]{0,8}").prop_map(|(who, name)| Op::Register { who, name }),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(from, to)| Op::Signal { from, to }),
        1 => any::<usize>().prop_map(Op::Chat),
        1 => (0u64..40).prop_map(Op::Tick),
    ]
}

/// Replays operations, remembering every id handed out.
struct World {
    server: SimServer,
    connections: Vec<ConnectionId>,
}

impl World {
    fn new(seed: u64) -> Self {
        let config = DriverConfig { max_capacity: 5, default_capacity: 3, ..Default::default() };
        Self { server: SimServer::with_config(seed, config), connections: Vec::new() }
    }

    fn pick(&self, index: usize) -> Option<ConnectionId> {
        if self.connections.is_empty() {
            return None;
        }
        Some(self.connections[index % self.connections.len()])
    }

    fn pick_room(&self, index: usize) -> RoomId {
        let snapshot = self.server.snapshot();
        if snapshot.rooms.is_empty() {
            return RoomId::new(0xdead_beef);
        }
        snapshot.rooms[index % snapshot.rooms.len()].id
    }

    fn apply(&mut self, op: &Op) {
        let Some(frame) = self.frame_for(op) else {
            return;
        };
        let (who, frame) = frame;
        // Frames from closed connections are rejected; that is part of the test.
        let _ = self.server.send_json(who, &frame);
    }

    fn frame_for(&mut self, op: &Op) -> Option<(ConnectionId, serde_json::Value)> {
        match op {
            Op::Connect => {
                let id = self.server.connect();
                self.connections.push(id);
                None
            },
            Op::Disconnect(who) => {
                let id = self.pick(*who)?;
                self.server.disconnect(id);
                None
            },
            Op::Tick(secs) => {
                self.server.advance(Duration::from_secs(*secs));
                self.server.tick();
                None
            },
            Op::Create { who, game, capacity } => {
                let mut frame = json!({"type": "createRoom", "gameType": GAME_TYPES[*game]});
                if *capacity > 0 {
                    frame["capacity"] = json!(capacity);
                }
                Some((self.pick(*who)?, frame))
            },
            Op::Join { who, room } => {
                let room_id = self.pick_room(*room);
                Some((self.pick(*who)?, json!({"type": "joinRoom", "roomId": room_id})))
            },
            Op::Leave(who) => {
                let id = self.pick(*who)?;
                let room_id = self.server.driver().registry().room_of(id).unwrap_or(RoomId::new(1));
                Some((id, json!({"type": "leaveRoom", "roomId": room_id})))
            },
            Op::Start(who) => Some((self.pick(*who)?, json!({"type": "startGame"}))),
            Op::Stop(who) => Some((self.pick(*who)?, json!({"type": "stopGame"}))),
            Op::Call { who, number } => {
                Some((self.pick(*who)?, json!({"type": "numberCall", "number": number})))
            },
            Op::Register { who, name } => {
                Some((self.pick(*who)?, json!({"type": "register", "name": name})))
            },
            Op::Signal { from, to } => {
                let target = self.pick(*to)?;
                Some((
                    self.pick(*from)?,
                    json!({"type": "candidate", "targetId": target, "payload": {"c": 1}}),
                ))
            },
            Op::Chat(who) => Some((self.pick(*who)?, json!({"type": "chat", "text": "bingo!"}))),
        }
    }
}

/// Called numbers only grow by appending one ball, or reset to empty.
fn calls_evolve_legally(before: &SystemSnapshot, after: &SystemSnapshot) -> Result<(), String> {
    for room in &after.rooms {
        let Some(prev) = before.room(room.id) else {
            continue;
        };
        let grew_by_one = room.called_numbers.len() <= prev.called_numbers.len() + 1
            && room.called_numbers.starts_with(&prev.called_numbers);
        if !grew_by_one && !room.called_numbers.is_empty() {
            return Err(format!(
                "room {}: calls went from {:?} to {:?}",
                room.id, prev.called_numbers, room.called_numbers
            ));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: room/registry invariants hold after every operation.
    #[test]
    fn prop_invariants_hold_under_random_operations(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 1..120),
    ) {
        let invariants = InvariantRegistry::standard();
        let mut world = World::new(seed);

        for op in &ops {
            let before = world.server.snapshot();
            world.apply(op);
            let after = world.server.snapshot();

            if let Err(violations) = invariants.check_all(&after) {
                let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
                prop_assert!(false, "after {:?}: {}", op, messages.join("; "));
            }
            if let Err(message) = calls_evolve_legally(&before, &after) {
                prop_assert!(false, "after {:?}: {}", op, message);
            }
        }
    }

    /// Property: control messages from non-hosts never change room state.
    #[test]
    fn prop_non_host_control_is_rejected(
        seed in any::<u64>(),
        numbers in prop::collection::vec(1i64..=75, 1..20),
    ) {
        let mut server = SimServer::with_config(seed, DriverConfig::default());
        let host = server.connect();
        let guest = server.connect();

        server.send_json(host, &json!({"type": "createRoom", "gameType": "75ball"}))?;
        let room_id = server.snapshot().rooms[0].id;
        server.send_json(guest, &json!({"type": "joinRoom", "roomId": room_id}))?;
        server.send_json(host, &json!({"type": "startGame"}))?;
        server.clear_inboxes();

        for number in numbers {
            let before = server.snapshot();
            server.send_json(guest, &json!({"type": "numberCall", "number": number}))?;
            server.send_json(guest, &json!({"type": "stopGame"}))?;
            server.send_json(guest, &json!({"type": "startGame"}))?;

            prop_assert_eq!(server.snapshot().rooms, before.rooms);
            let codes: Vec<_> =
                server.take_inbox(guest).iter().filter_map(ServerMessage::error_code).collect();
            prop_assert_eq!(codes, vec![ErrorCode::Unauthorized; 3]);
            prop_assert!(server.take_inbox(host).is_empty());
        }
    }

    /// Property: every accepted call is seen by all members, and a repeat is Duplicate.
    #[test]
    fn prop_calls_reach_every_member_once(
        seed in any::<u64>(),
        members in 1usize..6,
        numbers in prop::collection::vec(1i64..=90, 1..30),
    ) {
        let mut server = SimServer::with_config(seed, DriverConfig::default());
        let host = server.connect();
        server.send_json(host, &json!({"type": "createRoom", "gameType": "90ball"}))?;
        let room_id = server.snapshot().rooms[0].id;

        let mut guests = Vec::new();
        for _ in 0..members {
            let guest = server.connect();
            server.send_json(guest, &json!({"type": "joinRoom", "roomId": room_id}))?;
            guests.push(guest);
        }
        server.send_json(host, &json!({"type": "startGame"}))?;
        server.clear_inboxes();

        let mut expected: Vec<u8> = Vec::new();
        for number in numbers {
            server.send_json(host, &json!({"type": "numberCall", "number": number}))?;
            let ball = number as u8;

            if expected.contains(&ball) {
                let reply = server.take_inbox(host);
                prop_assert_eq!(reply.len(), 1);
                prop_assert_eq!(reply[0].error_code(), Some(ErrorCode::Duplicate));
            } else {
                expected.push(ball);
                for &id in guests.iter().chain(std::iter::once(&host)) {
                    let inbox = server.take_inbox(id);
                    prop_assert_eq!(inbox.len(), 1);
                    let matches_expected = matches!(
                        &inbox[0],
                        ServerMessage::NumberCalled { number: n, called_numbers, .. }
                            if *n == ball && *called_numbers == expected
                    );
                    prop_assert!(matches_expected, "unexpected {:?}", inbox[0]);
                }
            }
        }
    }
}
