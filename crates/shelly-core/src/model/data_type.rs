// ── Normalized data types ──

use serde::{Deserialize, Serialize};

/// What a property holds once normalized.
///
/// The integer variants mirror the Gen1 `U8`/`I16`/... range tokens and
/// bound the values the transformer accepts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
    #[default]
    Unknown,
    Boolean,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Enum,
    /// On / off / toggle actuator.
    Switch,
    /// Roller shutter / cover actuator.
    Cover,
    String,
}

impl DataType {
    /// Inclusive bounds of the fixed-width integer types.
    pub fn integer_bounds(self) -> Option<(i64, i64)> {
        match self {
            Self::Char => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            Self::UChar => Some((0, i64::from(u8::MAX))),
            Self::Short => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            Self::UShort => Some((0, i64::from(u16::MAX))),
            Self::Int => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            Self::UInt => Some((0, i64::from(u32::MAX))),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.integer_bounds().is_some()
    }

    /// Values are looked up in an enum format table.
    pub fn is_enumerated(self) -> bool {
        matches!(self, Self::Enum | Self::Switch | Self::Cover)
    }
}
