use crate::configuration::CvProfile;
use measurements::Voltage;
use wmidi::Note;

/// Maps pitches to pitch CV for a given volts-per-octave slope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoltageCurve {
    volts_per_octave: Voltage,
    ceiling: Voltage,
}

impl VoltageCurve {
    /// Pitch which produces [`REFERENCE_VOLTAGE`][Self::REFERENCE_VOLTAGE].
    pub const REFERENCE_PITCH: Note = Note::C4;
    /// Output for [`REFERENCE_PITCH`][Self::REFERENCE_PITCH], in volts.
    pub const REFERENCE_VOLTAGE: f64 = 1.0;

    /// Constructs a curve for `profile` which saturates at `ceiling` volts (the output's full scale).
    pub fn new(profile: CvProfile, ceiling: f32) -> Self {
        Self {
            volts_per_octave: profile.volts_per_octave(),
            ceiling: Voltage::from_volts(f64::from(ceiling)),
        }
    }

    fn voltage_per_half_step(&self) -> Voltage {
        self.volts_per_octave / 12.0
    }

    /// Returns the [`Voltage`] required to play a given [`Note`], clamped to what the output can produce.
    pub fn voltage(&self, note: Note) -> Voltage {
        let half_steps = f64::from(note as u8) - f64::from(Self::REFERENCE_PITCH as u8);
        let volts = (Voltage::from_volts(Self::REFERENCE_VOLTAGE)
            + half_steps * self.voltage_per_half_step())
        .as_volts();
        Voltage::from_volts(volts.clamp(0.0, self.ceiling.as_volts()))
    }
}
