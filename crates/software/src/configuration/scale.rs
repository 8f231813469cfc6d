use num_derive::{FromPrimitive, ToPrimitive};

/// Scales incoming pitches can be quantized to.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scale {
    /// All twelve pitch classes; selecting it disables quantization.
    Chromatic,
    /// Ionian mode.
    Major,
    /// Natural minor (Aeolian mode).
    Minor,
    /// Minor with a raised sixth.
    Dorian,
    /// Minor with a lowered second.
    Phrygian,
    /// Major with a raised fourth.
    Lydian,
    /// Major with a lowered seventh.
    Mixolydian,
    /// Five-note minor scale.
    MinorPentatonic,
    /// Five-note major scale.
    MajorPentatonic,
    /// Minor pentatonic plus the flat fifth.
    Blues,
    /// Natural minor with a raised seventh.
    HarmonicMinor,
    /// Ascending melodic minor.
    MelodicMinor,
}
impl super::CycleConfig for Scale {}

impl Scale {
    /// Semitone offsets from the root which belong to the scale.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::MajorPentatonic => &[0, 2, 4, 7, 9],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
        }
    }

    /// Determines whether a MIDI pitch belongs to the scale built on `root` (a pitch class, 0 = C).
    pub fn contains(&self, root: u8, pitch: u8) -> bool {
        let degree = (pitch % 12 + 12 - root % 12) % 12;
        self.intervals().contains(&degree)
    }
}
