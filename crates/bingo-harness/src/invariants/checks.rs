//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A room never holds more members than its capacity.
pub struct CapacityBound;

impl Invariant for CapacityBound {
    fn name(&self) -> &'static str {
        "capacity_bound"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if room.members.len() > room.capacity {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "room {} has {} members, capacity {}",
                        room.id,
                        room.members.len(),
                        room.capacity
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Every room has exactly one host, and that host is a connected member.
///
/// A room stores a single `host_id`, so "exactly one" reduces to the host
/// being a live member.
pub struct SingleConnectedHost;

impl Invariant for SingleConnectedHost {
    fn name(&self) -> &'static str {
        "single_connected_host"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if !room.members.contains(&room.host_id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "room {}: host {} is not among members {:?}",
                        room.id, room.host_id, room.members
                    ),
                });
            }

            let connected = state.connection(room.host_id).is_some_and(|c| c.connected);
            if !connected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("room {}: host {} is not connected", room.id, room.host_id),
                });
            }
        }
        Ok(())
    }
}

/// A room whose last member left is gone.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn name(&self) -> &'static str {
        "no_empty_rooms"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.rooms.iter().find(|r| r.members.is_empty()) {
            Some(room) => Err(Violation {
                invariant: self.name(),
                message: format!("room {} has no members", room.id),
            }),
            None => Ok(()),
        }
    }
}

/// Room member lists and connection back-references agree.
///
/// Every member is a connected record pointing back at the room, every
/// connection pointing at a room is listed there, and no connection is in two
/// rooms.
pub struct MembershipConsistency;

impl Invariant for MembershipConsistency {
    fn name(&self) -> &'static str {
        "membership_consistency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();

        for room in &state.rooms {
            for &member in &room.members {
                if !seen.insert(member) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("connection {member} is a member of two rooms"),
                    });
                }

                match state.connection(member) {
                    Some(conn) if conn.connected && conn.room_id == Some(room.id) => {},
                    other => {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "room {} lists {member}, but its record is {other:?}",
                                room.id
                            ),
                        });
                    },
                }
            }
        }

        for conn in &state.connections {
            if let Some(room_id) = conn.room_id {
                let listed = state.room(room_id).is_some_and(|r| r.members.contains(&conn.id));
                if !listed {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "connection {} points at room {room_id} but is not a member",
                            conn.id
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Called numbers are unique and inside the board variant's range.
pub struct UniqueCalledNumbers;

impl Invariant for UniqueCalledNumbers {
    fn name(&self) -> &'static str {
        "unique_called_numbers"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let mut seen = HashSet::new();
            for &number in &room.called_numbers {
                if number == 0 || number > room.max_number {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room {}: {number} outside 1..={}",
                            room.id, room.max_number
                        ),
                    });
                }
                if !seen.insert(number) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("room {}: {number} called twice", room.id),
                    });
                }
            }
        }
        Ok(())
    }
}
