//! The fixed estimation deck.
//!
//! Votes are drawn from a Fibonacci-like scale plus two non-numeric pass
//! cards. Numeric cards travel as JSON numbers, the pass cards as strings.
//! Clients are sloppy about this (the reference client sends `"5"` as a
//! string), so deserialization also accepts numeric strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// A single card from the estimation deck.
///
/// The deck is fixed: `0, 1, 2, 3, 5, 8, 13, 20, 40, 100, "Café", "Joker"`.
/// Ordering follows deck order, with the pass cards sorting after every
/// numeric card.
///
/// # Invariants
///
/// - A `CardValue` always denotes a member of the deck; anything else fails
///   to deserialize and [`CardValue::from_json`] returns `None`. Deck
///   membership is therefore checked once, at the protocol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CardValue {
    /// 0 points
    Zero,
    /// 1 point
    One,
    /// 2 points
    Two,
    /// 3 points
    Three,
    /// 5 points
    Five,
    /// 8 points
    Eight,
    /// 13 points
    Thirteen,
    /// 20 points
    Twenty,
    /// 40 points
    Forty,
    /// 100 points
    Hundred,
    /// Pass card: "I need a break"
    Cafe,
    /// Pass card: "I cannot estimate this"
    Joker,
}

impl CardValue {
    /// The full deck in display order.
    pub const DECK: [Self; 12] = [
        Self::Zero,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Five,
        Self::Eight,
        Self::Thirteen,
        Self::Twenty,
        Self::Forty,
        Self::Hundred,
        Self::Cafe,
        Self::Joker,
    ];

    /// Numeric value of the card. `None` for the pass cards.
    #[must_use]
    pub const fn points(self) -> Option<u64> {
        match self {
            Self::Zero => Some(0),
            Self::One => Some(1),
            Self::Two => Some(2),
            Self::Three => Some(3),
            Self::Five => Some(5),
            Self::Eight => Some(8),
            Self::Thirteen => Some(13),
            Self::Twenty => Some(20),
            Self::Forty => Some(40),
            Self::Hundred => Some(100),
            Self::Cafe | Self::Joker => None,
        }
    }

    /// Card for a numeric point value. `None` if the number is not in the
    /// deck.
    #[must_use]
    pub const fn from_points(points: u64) -> Option<Self> {
        match points {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            5 => Some(Self::Five),
            8 => Some(Self::Eight),
            13 => Some(Self::Thirteen),
            20 => Some(Self::Twenty),
            40 => Some(Self::Forty),
            100 => Some(Self::Hundred),
            _ => None,
        }
    }

    /// Card for its wire label. Numeric strings are accepted because the
    /// reference client sends them; surrounding whitespace is tolerated.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Café" => Some(Self::Cafe),
            "Joker" => Some(Self::Joker),
            other => other.parse::<u64>().ok().and_then(Self::from_points),
        }
    }

    /// Wire label of the card.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Five => "5",
            Self::Eight => "8",
            Self::Thirteen => "13",
            Self::Twenty => "20",
            Self::Forty => "40",
            Self::Hundred => "100",
            Self::Cafe => "Café",
            Self::Joker => "Joker",
        }
    }

    /// Classify an arbitrary JSON value as a deck card.
    ///
    /// Returns `None` for anything outside the deck. The session layer uses
    /// this to reject a bad vote with a request-scoped error instead of
    /// failing to parse the whole message.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().and_then(Self::from_points),
            serde_json::Value::String(s) => Self::from_label(s),
            _ => None,
        }
    }
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for CardValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.points() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(self.label()),
        }
    }
}

impl<'de> Deserialize<'de> for CardValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CardVisitor;

        impl de::Visitor<'_> for CardVisitor {
            type Value = CardValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a card from the estimation deck")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<CardValue, E> {
                CardValue::from_points(v)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<CardValue, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(CardValue::from_points)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CardValue, E> {
                CardValue::from_label(v)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(CardVisitor)
    }
}
