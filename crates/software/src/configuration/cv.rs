use measurements::Voltage;
use num_derive::{FromPrimitive, ToPrimitive};

/// Pitch CV slope.
///
/// Both profiles share a reference point (middle C at 1 V); only the volts per octave differ.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvProfile {
    /// 1 V/octave, as used by most modular systems.
    Standard,
    /// 1.035 V/octave, for instruments calibrated to a slightly stretched scale.
    Alternate,
}
impl super::CycleConfig for CvProfile {}

impl CvProfile {
    /// Voltage spanning one octave.
    pub fn volts_per_octave(&self) -> Voltage {
        match self {
            CvProfile::Standard => Voltage::from_volts(1.0),
            CvProfile::Alternate => Voltage::from_volts(1.035),
        }
    }
}

/// Electrical convention of the gate output.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerPolarity {
    /// Voltage trigger: the output is high while a note sounds.
    VTrig,
    /// Switch trigger: the output is pulled low while a note sounds.
    STrig,
}
impl super::CycleConfig for TriggerPolarity {}

impl TriggerPolarity {
    /// Translates whether a note is sounding into the physical output level (`true` is high).
    pub fn level(&self, sounding: bool) -> bool {
        match self {
            TriggerPolarity::VTrig => sounding,
            TriggerPolarity::STrig => !sounding,
        }
    }
}
