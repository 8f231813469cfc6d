//! Provides a struct [`ActivatedNotes`] for tracking notes that are currently held. Here "activated notes" means the
//! notes that are currently being played (e.g., depressed on a keyboard), regardless of whether or not those notes
//! are actually voiced.
//!
//! Two independent instances exist at runtime: the arpeggiator's [`HeldNotes`] and the voltage engine's
//! [`ActiveNoteStack`]. They see the same keys but are mutated on different rules (latch, quantization), so they
//! are never shared.

use tinyvec::ArrayVec;
use wmidi::{Note, U7};

/// Per the General MIDI Level 2 specification, compliant devices "must be capable of supplying polyphony of
/// 32 or more allocated notes simultaneously." Thus, this will be the default size of an ActivatedNotes instance.
pub const GM2_SIMUL_NOTE_NUM: usize = 32;

/// Notes buffered by the arpeggiator.
pub type HeldNotes = ActivatedNotes<GM2_SIMUL_NOTE_NUM>;

/// Raw held notes used to resolve the pitch CV.
pub type ActiveNoteStack = ActivatedNotes<GM2_SIMUL_NOTE_NUM>;

/// An insertion-ordered set of held notes, keyed by pitch, remembering the velocity each was played with.
///
/// Internally, this struct uses the [`U7`] type because [`tinyvec`] requires that `Items` implement [`Default`].
/// However, [`U7`] can be a bit unwieldy, so public interfaces deal with the related [`Note`] type for pitches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivatedNotes<const N: usize = GM2_SIMUL_NOTE_NUM> {
    /// `(pitch, velocity)` pairs in the order they were activated
    data: ArrayVec<[(U7, U7); N]>,
}

impl Default for ActivatedNotes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for ActivatedNotes<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ActivatedNotes {{ ");
        defmt::write!(fmt, "data: [");
        for (i, &(note, velocity)) in self.data.iter().enumerate() {
            if i == 0 {
                defmt::write!(fmt, " ");
            } else {
                defmt::write!(fmt, ", ");
            }
            defmt::write!(
                fmt,
                "{} ({}) @ {}",
                Note::from(note).to_str(),
                u8::from(note),
                u8::from(velocity)
            );
        }
        defmt::write!(fmt, " ]");
        defmt::write!(fmt, " }}");
    }
}

impl<const N: usize> ActivatedNotes<N> {
    /// Construct a new, empty `ActivatedNotes`.
    pub fn new() -> Self {
        Self {
            data: ArrayVec::new(),
        }
    }

    /// Add a [`Note`] to the list of those currently activated. Equivalent to depressing a key on a keyboard.
    ///
    /// Returns `false` if the note was already held or there was no room for it; the list is unchanged in that case.
    pub fn add(&mut self, note: Note, velocity: U7) -> bool {
        let pitch = U7::from_u8_lossy(note as u8);
        // only add if space allows and if the note isn't (somehow) already registered as active; otherwise, ignore input
        if self.data.len() == self.data.capacity() || self.contains(note) {
            return false;
        }
        self.data.push((pitch, velocity));
        true
    }

    /// Remove a [`Note`] from the list of those currently activated. Equivalent to releasing a depressed key on a keyboard.
    ///
    /// Returns whether the note was held.
    pub fn remove(&mut self, note: Note) -> bool {
        let pitch = U7::from_u8_lossy(note as u8);
        let before = self.data.len();
        self.data.retain(|&(n, _)| n != pitch);
        before != self.data.len()
    }

    /// Releases every note at once.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Determine if a specific [`Note`] is activated.
    pub fn contains(&self, note: Note) -> bool {
        let pitch = U7::from_u8_lossy(note as u8);
        self.data.iter().any(|&(n, _)| n == pitch)
    }

    /// Determine if any [`Note`]s are activated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of activated notes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns an [`Iterator`] over the activated [`Note`]s.
    ///
    /// Order is preserved; e.g., the first performed `Note` can be accessed via the first call to `.next()`, and the
    /// last performed `Note` is accessible via `.last()`.
    pub fn iter(&self) -> impl Iterator<Item = Note> + '_ {
        self.data.iter().map(|&(n, _)| Note::from(n))
    }

    /// Like [`iter`][Self::iter], but yields each note alongside its velocity.
    pub fn iter_with_velocity(&self) -> impl Iterator<Item = (Note, U7)> + '_ {
        self.data.iter().map(|&(n, v)| (Note::from(n), v))
    }
}
