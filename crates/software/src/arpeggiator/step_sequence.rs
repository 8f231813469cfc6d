use crate::{activated_notes::HeldNotes, configuration::ArpPattern};
use tinyvec::ArrayVec;
use wmidi::{Note, U7};

/// Enough room for the longest pattern: 32 held notes over 4 octaves, each played twice.
pub const MAX_STEPS: usize = 256;

/// Upper bound on held notes spread across every octave.
const MAX_EXPANDED: usize = 128;

/// Patterns which interleave an extreme note need at least this many notes to make sense.
const INTERLEAVE_MIN_NOTES: usize = 4;

type Expanded = ArrayVec<[(U7, U7); MAX_EXPANDED]>;

/// The ordered notes an arpeggio cycles through.
///
/// A sequence is always generated from scratch from the held notes; it is never patched in place.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct StepSequence {
    steps: ArrayVec<[(U7, U7); MAX_STEPS]>,
}

impl StepSequence {
    /// Builds the sequence `pattern` produces from `held` spread across `octave_range` octaves.
    ///
    /// Transpositions above the MIDI range are dropped. An empty set of held notes yields an empty sequence.
    pub fn generate(pattern: ArpPattern, held: &HeldNotes, octave_range: u8) -> Self {
        let mut sequence = Self::default();
        if held.is_empty() || octave_range == 0 {
            return sequence;
        }

        let chord = sorted(held);
        let expanded = expand(&chord, octave_range);
        let n = expanded.len();

        match pattern {
            ArpPattern::Up | ArpPattern::Random => sequence.extend(expanded.iter().copied()),
            ArpPattern::Down => sequence.extend(expanded.iter().rev().copied()),
            ArpPattern::UpDown => {
                sequence.extend(expanded.iter().copied());
                sequence.extend(inner(&expanded).iter().rev().copied());
            }
            ArpPattern::DownUp => {
                sequence.extend(expanded.iter().rev().copied());
                sequence.extend(inner(&expanded).iter().copied());
            }
            ArpPattern::UpDownInclusive => {
                sequence.extend(expanded.iter().copied());
                sequence.extend(expanded.iter().rev().copied());
            }
            ArpPattern::DownUpInclusive => {
                sequence.extend(expanded.iter().rev().copied());
                sequence.extend(expanded.iter().copied());
            }
            ArpPattern::Up2x => {
                sequence.extend(expanded.iter().flat_map(|&step| [step, step]));
            }
            ArpPattern::Down2x => {
                sequence.extend(expanded.iter().rev().flat_map(|&step| [step, step]));
            }
            ArpPattern::Converge => {
                let (mut low, mut high) = (0, n - 1);
                while low < high {
                    sequence.push(expanded[low]);
                    sequence.push(expanded[high]);
                    low += 1;
                    high -= 1;
                }
                if low == high {
                    sequence.push(expanded[low]);
                }
            }
            ArpPattern::Diverge if n >= INTERLEAVE_MIN_NOTES => {
                // odd counts start on the middle note, even counts on the lower of the two middle notes
                let mut low = n / 2;
                let mut high = n / 2;
                if n % 2 == 1 {
                    sequence.push(expanded[high]);
                    high += 1;
                }
                while low > 0 || high < n {
                    if low > 0 {
                        low -= 1;
                        sequence.push(expanded[low]);
                    }
                    if high < n {
                        sequence.push(expanded[high]);
                        high += 1;
                    }
                }
            }
            ArpPattern::PinkyUp if n >= INTERLEAVE_MIN_NOTES => {
                let (body, top) = expanded.split_at(n - 1);
                for pair in body.chunks(2) {
                    sequence.extend(pair.iter().copied());
                    sequence.push(top[0]);
                }
            }
            ArpPattern::ThumbUp if n >= INTERLEAVE_MIN_NOTES => {
                let (bottom, body) = expanded.split_at(1);
                for pair in body.chunks(2) {
                    sequence.push(bottom[0]);
                    sequence.extend(pair.iter().copied());
                }
            }
            ArpPattern::Diverge | ArpPattern::PinkyUp | ArpPattern::ThumbUp => {
                sequence.extend(expanded.iter().copied());
            }
            ArpPattern::OctaveUp => {
                for octave in 0..octave_range {
                    let block = chord
                        .iter()
                        .filter_map(|&(pitch, velocity)| {
                            transpose(pitch, octave).map(|transposed| (transposed, velocity))
                        })
                        .collect::<Expanded>();
                    if let Some(&lowest) = block.first() {
                        sequence.push(lowest);
                        sequence.extend(block.iter().copied());
                    }
                }
            }
            ArpPattern::ChordRepeat => {
                sequence.extend(chord.iter().copied());
                sequence.extend(chord.iter().copied());
                sequence.extend(expanded.iter().copied());
            }
            ArpPattern::AsPlayed => {
                for (note, velocity) in held.iter_with_velocity() {
                    let pitch = U7::from_u8_lossy(note as u8);
                    for octave in 0..octave_range {
                        if let Some(transposed) = transpose(pitch, octave) {
                            sequence.push((transposed, velocity));
                        }
                    }
                }
            }
        }
        sequence
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The note and velocity at `index`.
    pub fn get(&self, index: usize) -> Option<(Note, U7)> {
        self.steps
            .get(index)
            .map(|&(pitch, velocity)| (Note::from(pitch), velocity))
    }

    /// Every step's note, in order.
    pub fn notes(&self) -> impl Iterator<Item = Note> + '_ {
        self.steps.iter().map(|&(pitch, _)| Note::from(pitch))
    }

    fn push(&mut self, step: (U7, U7)) {
        // sized for the worst case; anything beyond it would be a bug, so it is dropped rather than panicking
        let _ = self.steps.try_push(step);
    }

    fn extend(&mut self, steps: impl Iterator<Item = (U7, U7)>) {
        steps.for_each(|step| self.push(step));
    }
}

/// Held notes ordered by pitch.
fn sorted(held: &HeldNotes) -> Expanded {
    let mut chord: Expanded = held
        .iter_with_velocity()
        .map(|(note, velocity)| (U7::from_u8_lossy(note as u8), velocity))
        .collect();
    chord.sort_unstable_by_key(|&(pitch, _)| u8::from(pitch));
    chord
}

/// Sorted chord repeated `octave_range` times, an octave higher each time.
fn expand(chord: &[(U7, U7)], octave_range: u8) -> Expanded {
    (0..octave_range)
        .flat_map(|octave| {
            chord.iter().filter_map(move |&(pitch, velocity)| {
                transpose(pitch, octave).map(|transposed| (transposed, velocity))
            })
        })
        .collect()
}

fn transpose(pitch: U7, octaves: u8) -> Option<U7> {
    let transposed = u8::from(pitch) + 12 * octaves;
    (transposed <= 127).then(|| U7::from_u8_lossy(transposed))
}

/// Everything but the first and last element.
fn inner(steps: &[(U7, U7)]) -> &[(U7, U7)] {
    match steps.len() {
        0..=2 => &[],
        len => &steps[1..len - 1],
    }
}
