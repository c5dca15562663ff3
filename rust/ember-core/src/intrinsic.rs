//! Intrinsic tags for the hand-assembled primitives.
//!
//! A compiler may inline a call to one of these primitives as the matching
//! instruction sequence, but only when the callee is the exact routine built
//! at startup and tagged with the intrinsic.

use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, FromRepr, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
    FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "kebab-case")]
pub enum Intrinsic {
    Debug = 0,
    Error,
    Apply,
    Yield,
    Resume,
    Get,
    Put,
    Length,
    Add,
    Subtract,
    Multiply,
    Divide,
    Band,
    Bor,
    Bxor,
    Bnot,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    OrderGt,
    OrderLt,
    OrderGte,
    OrderLte,
    OrderEq,
    OrderNeq,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

impl Intrinsic {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_kebab_case() {
        assert_eq!(Intrinsic::ShiftRightUnsigned.name(), "shift-right-unsigned");
        assert_eq!(Intrinsic::OrderGte.name(), "order-gte");
        assert_eq!(Intrinsic::from_repr(2), Some(Intrinsic::Apply));
    }
}
