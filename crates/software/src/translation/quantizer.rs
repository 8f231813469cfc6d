use crate::configuration::Scale;
use wmidi::Note;

/// Furthest any pitch can be from a member of the supported scales, which never leave a gap wider than a minor third.
const MAX_SEARCH: u8 = 6;

/// Snaps MIDI pitches to the nearest member of a scale.
///
/// The search spans octave boundaries (B snaps up to the next C in C major), ties resolve to the lower pitch, and
/// the result never leaves the MIDI range. Quantizing an in-scale pitch returns it unchanged, so the operation is
/// idempotent, and the arpeggiator relies on that to remove exactly the pitch it inserted.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScaleQuantizer {
    scale: Scale,
    root: u8,
}

impl ScaleQuantizer {
    /// Quantizer for `scale` built on `root` (a pitch class, 0 = C).
    pub fn new(scale: Scale, root: u8) -> Self {
        Self {
            scale,
            root: root % 12,
        }
    }

    /// A quantizer that leaves every pitch alone.
    pub fn chromatic() -> Self {
        Self::new(Scale::Chromatic, 0)
    }

    /// Returns the in-scale pitch nearest to `note`.
    pub fn quantize(&self, note: Note) -> Note {
        let pitch = note as u8;
        if self.scale == Scale::Chromatic {
            return note;
        }
        for distance in 0..=MAX_SEARCH {
            if distance <= pitch && self.scale.contains(self.root, pitch - distance) {
                return Note::from_u8_lossy(pitch - distance);
            }
            let above = pitch + distance;
            if above <= 127 && self.scale.contains(self.root, above) {
                return Note::from_u8_lossy(above);
            }
        }
        note
    }
}
