use num_derive::{FromPrimitive, ToPrimitive};

/// MIDI data the auxiliary CV output follows.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuxSource {
    /// The auxiliary output is left alone.
    Disabled,
    /// Value of a single controller, selected by number.
    ControlChange,
    /// Channel pressure (aftertouch).
    ChannelPressure,
    /// Pitch bend wheel.
    PitchBend,
    /// Velocity of the most recent note-on.
    Velocity,
}
impl super::CycleConfig for AuxSource {}

/// How heavily the auxiliary output is smoothed.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Smoothing {
    /// Follows the source immediately.
    Off,
    /// Light smoothing.
    Low,
    /// Moderate smoothing.
    Mid,
    /// Heavy smoothing.
    High,
}
impl super::CycleConfig for Smoothing {}

impl Smoothing {
    /// Weight given to each new value in the exponential moving average.
    pub fn alpha(&self) -> f32 {
        match self {
            Smoothing::Off => 1.0,
            Smoothing::Low => 0.9,
            Smoothing::Mid => 0.7,
            Smoothing::High => 0.5,
        }
    }
}
