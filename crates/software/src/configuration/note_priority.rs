use num_derive::{FromPrimitive, ToPrimitive};
use wmidi::Note;

/// Trait for selecting which [`Note`] to play when many have been activated.
pub trait ProvideNote {
    /// Selects a single [`Note`] from an iterator yielding notes in the order they were activated.
    fn provide_note(&self, notes: impl Iterator<Item = Note>) -> Option<Note>;
}

/// Determines which note drives the pitch CV when more notes are held than the single voice can sound.
///
/// When a note is released, it is replaced by the next note (if any) based on the selected algorithm.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotePriority {
    /// Prioritizes notes based on the order in which they are received. Notes played later will be voiced over earlier ones.
    Last,
    /// Prioritizes notes based on the order in which they are received. Notes played earlier will be voiced over later ones.
    First,
    /// Prioritizes notes based on pitch. Lower notes (e.g., those on the left side of the keyboard) will be voiced over higher ones.
    Lowest,
    /// Prioritizes notes based on pitch. Higher notes (e.g., those on the right side of the keyboard) will be voiced over lower ones.
    Highest,
}
impl super::CycleConfig for NotePriority {}

impl ProvideNote for NotePriority {
    fn provide_note(&self, mut notes: impl Iterator<Item = Note>) -> Option<Note> {
        match self {
            NotePriority::First => notes.next(),
            NotePriority::Last => notes.last(),
            NotePriority::Lowest => notes.min(),
            NotePriority::Highest => notes.max(),
        }
    }
}
