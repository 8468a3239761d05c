//! Opaque identifiers for connections and rooms.
//!
//! Both are 64-bit values rendered as 16 lowercase hex digits. Clients treat
//! them as strings; they are parsed back on the way in and an unparseable id
//! is indistinguishable from one that does not exist.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {0:?}")]
pub struct IdParseError(pub String);

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex(s).map(Self).ok_or_else(|| IdParseError(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

opaque_id!(
    /// Identity of a single client connection.
    ///
    /// Allocated by the connection registry when the socket is accepted and
    /// never handed out twice within a process.
    ConnectionId
);

opaque_id!(
    /// Identity of a room.
    RoomId
);

/// `from_str_radix` accepts a leading `+`; ids must be bare hex digits.
fn parse_hex(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(ConnectionId::new(42).to_string(), "000000000000002a");
        assert_eq!(RoomId::new(u64::MAX).to_string(), "ffffffffffffffff");
    }

    #[test]
    fn parse_accepts_short_and_mixed_case() {
        assert_eq!("2a".parse::<ConnectionId>().unwrap(), ConnectionId::new(42));
        assert_eq!("DEADbeef".parse::<RoomId>().unwrap(), RoomId::new(0xdead_beef));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "+1", "-1", "xyz", "00000000000000000", " 1", "0x10"] {
            assert!(bad.parse::<RoomId>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn serializes_as_json_string() {
        let json = serde_json::to_string(&RoomId::new(255)).unwrap();
        assert_eq!(json, "\"00000000000000ff\"");

        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RoomId::new(255));
    }

    #[test]
    fn deserialize_rejects_numbers() {
        assert!(serde_json::from_str::<ConnectionId>("42").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(raw in any::<u64>()) {
            let id = ConnectionId::new(raw);
            prop_assert_eq!(id.to_string().parse::<ConnectionId>().unwrap(), id);
        }
    }
}
