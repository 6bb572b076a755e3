//! Per-period position state.

use std::fmt;

use serde::{Serialize, Serializer};

/// Position held during one period.
///
/// Variants are declared in ordinal order so the derived ordering matches
/// the numeric values: anything `>= LongBuy` is long, `<= ShortSell` is short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PositionState {
    ShortSell,
    #[default]
    Close,
    LongBuy,
    /// Long entered through the quick re-entry rule. Leaves only to
    /// `LongBuy` or `Close`.
    LongRebuy,
}

/// Direction of an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl PositionState {
    pub fn value(self) -> i8 {
        match self {
            PositionState::ShortSell => -1,
            PositionState::Close => 0,
            PositionState::LongBuy => 1,
            PositionState::LongRebuy => 2,
        }
    }

    pub fn is_long(self) -> bool {
        self >= PositionState::LongBuy
    }

    pub fn is_short(self) -> bool {
        self <= PositionState::ShortSell
    }

    pub fn is_flat(self) -> bool {
        self == PositionState::Close
    }

    pub fn direction(self) -> Option<Direction> {
        if self.is_long() {
            Some(Direction::Long)
        } else if self.is_short() {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::ShortSell => write!(f, "short sell"),
            PositionState::Close => write!(f, "close"),
            PositionState::LongBuy => write!(f, "long buy"),
            PositionState::LongRebuy => write!(f, "long rebuy"),
        }
    }
}

impl Serialize for PositionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.value())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}
