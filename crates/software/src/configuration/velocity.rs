use num_derive::{FromPrimitive, ToPrimitive};

/// Velocity policy for arpeggiated notes.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VelocityMode {
    /// Each step keeps the velocity its note was played with.
    Passthrough,
    /// Every step uses the configured fixed velocity.
    Fixed,
}
impl super::CycleConfig for VelocityMode {}
