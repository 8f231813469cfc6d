use num_derive::{FromPrimitive, ToPrimitive};

/// Where the clock gets its timing from.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSourceKind {
    /// Steps are generated on-device at the configured BPM.
    Internal,
    /// Steps follow MIDI timing clock and transport messages.
    External,
}
impl super::CycleConfig for ClockSourceKind {}

/// Scales the base clock interval by an integer factor before swing is applied.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockRate {
    /// One eighth as fast.
    Div8,
    /// One quarter as fast.
    Div4,
    /// Half as fast.
    Div2,
    /// Unchanged.
    Normal,
    /// Twice as fast.
    Mul2,
    /// Four times as fast.
    Mul4,
    /// Eight times as fast.
    Mul8,
}
impl super::CycleConfig for ClockRate {}

impl ClockRate {
    /// Returns the rate as a `(multiplier, divider)` pair; exactly one of them is 1.
    pub fn factor(&self) -> (u8, u8) {
        match self {
            ClockRate::Div8 => (1, 8),
            ClockRate::Div4 => (1, 4),
            ClockRate::Div2 => (1, 2),
            ClockRate::Normal => (1, 1),
            ClockRate::Mul2 => (2, 1),
            ClockRate::Mul4 => (4, 1),
            ClockRate::Mul8 => (8, 1),
        }
    }
}
