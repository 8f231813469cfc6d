use num_derive::{FromPrimitive, ToPrimitive};

/// Order in which the arpeggiator plays back held notes.
///
/// Variants are numbered 0 through 15 in declaration order; that number is the pattern id shown to performers.
#[derive(Debug, Copy, Clone, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArpPattern {
    /// Lowest to highest.
    Up,
    /// Highest to lowest.
    Down,
    /// Up then back down, without repeating the top or bottom note at the turn.
    UpDown,
    /// Down then back up, without repeating the top or bottom note at the turn.
    DownUp,
    /// Picks a held note at random on every step.
    Random,
    /// Plays notes in the order they were received.
    AsPlayed,
    /// Up then back down, repeating the turn notes.
    UpDownInclusive,
    /// Down then back up, repeating the turn notes.
    DownUpInclusive,
    /// Lowest to highest, each note played twice.
    Up2x,
    /// Highest to lowest, each note played twice.
    Down2x,
    /// Alternates between the outermost remaining notes, moving inward.
    Converge,
    /// Starts in the middle and alternates outward.
    Diverge,
    /// Ascends, returning to the top note after every two notes.
    PinkyUp,
    /// Ascends, returning to the bottom note before every two notes.
    ThumbUp,
    /// Ascends one octave at a time, repeating the lowest note of each octave.
    OctaveUp,
    /// Plays the chord up twice, then climbs through every octave.
    ChordRepeat,
}
impl super::CycleConfig for ArpPattern {}

impl ArpPattern {
    /// Short label suitable for a small display or log line.
    pub fn name(&self) -> &'static str {
        match self {
            ArpPattern::Up => "Up",
            ArpPattern::Down => "Down",
            ArpPattern::UpDown => "UpDown",
            ArpPattern::DownUp => "DownUp",
            ArpPattern::Random => "Random",
            ArpPattern::AsPlayed => "AsPlayed",
            ArpPattern::UpDownInclusive => "UpDownInc",
            ArpPattern::DownUpInclusive => "DownUpInc",
            ArpPattern::Up2x => "Up2x",
            ArpPattern::Down2x => "Down2x",
            ArpPattern::Converge => "Converge",
            ArpPattern::Diverge => "Diverge",
            ArpPattern::PinkyUp => "PinkyUp",
            ArpPattern::ThumbUp => "ThumbUp",
            ArpPattern::OctaveUp => "OctaveUp",
            ArpPattern::ChordRepeat => "ChordRep",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{FromPrimitive, ToPrimitive};

    #[test]
    fn ids_match_the_front_panel() {
        for (id, pattern) in [
            (0, ArpPattern::Up),
            (3, ArpPattern::DownUp),
            (4, ArpPattern::Random),
            (5, ArpPattern::AsPlayed),
            (6, ArpPattern::UpDownInclusive),
            (15, ArpPattern::ChordRepeat),
        ] {
            assert_eq!(Some(id), pattern.to_u8(), "Expected left but got right");
        }
        assert_eq!(None, ArpPattern::from_u8(16), "Expected left but got right");
    }
}
