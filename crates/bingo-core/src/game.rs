//! Board variants.
//!
//! The variant is chosen when a room is created and never changes. It decides
//! which numbers the host may call.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Error returned for a game type name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game type: {0:?}")]
pub struct UnknownGameType(pub String);

/// Bingo board variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameType {
    /// Classic 5x5 card, numbers 1-75.
    Ball75,
    /// 9x3 ticket, numbers 1-90.
    Ball90,
    /// 3x3 speed card, numbers 1-30.
    Ball30,
    /// 75-ball card where a named pattern wins.
    Pattern,
    /// 75-ball card where every square must be marked.
    Coverall,
}

impl GameType {
    /// Every variant, in wire-name order.
    pub const ALL: [Self; 5] = [Self::Ball75, Self::Ball90, Self::Ball30, Self::Pattern, Self::Coverall];

    /// Name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ball75 => "75ball",
            Self::Ball90 => "90ball",
            Self::Ball30 => "30ball",
            Self::Pattern => "pattern",
            Self::Coverall => "coverall",
        }
    }

    /// Highest number that can be drawn. The lowest is always 1.
    pub const fn max_number(self) -> u8 {
        match self {
            Self::Ball75 | Self::Pattern | Self::Coverall => 75,
            Self::Ball90 => 90,
            Self::Ball30 => 30,
        }
    }

    /// Narrow `number` to a ball in this variant's range.
    pub fn ball(self, number: i64) -> Option<u8> {
        u8::try_from(number).ok().filter(|n| (1..=self.max_number()).contains(n))
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = UnknownGameType;

    /// Accepts the wire name plus the dashed spelling (`75-ball`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str() == normalized)
            .ok_or_else(|| UnknownGameType(s.to_string()))
    }
}

impl Serialize for GameType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GameType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_dashed_spelling() {
        assert_eq!("75ball".parse::<GameType>().unwrap(), GameType::Ball75);
        assert_eq!("90-ball".parse::<GameType>().unwrap(), GameType::Ball90);
        assert_eq!("Coverall".parse::<GameType>().unwrap(), GameType::Coverall);
        assert!("80ball".parse::<GameType>().is_err());
        assert!("".parse::<GameType>().is_err());
    }

    #[test]
    fn wire_name_round_trips_for_every_variant() {
        for variant in GameType::ALL {
            assert_eq!(variant.as_str().parse::<GameType>().unwrap(), variant);
        }
    }

    #[test]
    fn ball_range_follows_variant() {
        assert_eq!(GameType::Ball75.ball(75), Some(75));
        assert_eq!(GameType::Ball75.ball(76), None);
        assert_eq!(GameType::Ball90.ball(90), Some(90));
        assert_eq!(GameType::Ball30.ball(31), None);
        assert_eq!(GameType::Pattern.ball(0), None);
        assert_eq!(GameType::Coverall.ball(-5), None);
        assert_eq!(GameType::Coverall.ball(i64::MAX), None);
    }
}
