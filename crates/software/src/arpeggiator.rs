//! Turns a held chord into a stream of single notes, one per clock step.

mod step_sequence;
pub use step_sequence::*;

use crate::{
    activated_notes::HeldNotes,
    configuration::{ArpPattern, Config, VelocityMode},
    output::{MidiOut, MidiSink, VoltageSink},
    translation::ScaleQuantizer,
    voltage::CvOutput,
};
use wmidi::{Channel, Note, U7};

/// Holds the chord being arpeggiated and plays through its [`StepSequence`].
///
/// At most one note sounds at a time; every step releases the previous note before playing the next.
#[derive(Debug)]
pub struct Arpeggiator {
    held: HeldNotes,
    sequence: StepSequence,
    index: usize,
    sounding: Option<Note>,
    pattern: ArpPattern,
    octave_range: u8,
    velocity: VelocityMode,
    fixed_velocity: U7,
    channel: Channel,
    quantizer: ScaleQuantizer,
    rng: Lcg,
}

impl Arpeggiator {
    /// Creates an arpeggiator with nothing held. Incoming notes are snapped with `quantizer` before they are held.
    pub fn new(config: &Config, quantizer: ScaleQuantizer) -> Self {
        Self {
            held: HeldNotes::new(),
            sequence: StepSequence::default(),
            index: 0,
            sounding: None,
            pattern: config.pattern,
            octave_range: config.octave_range,
            velocity: config.velocity,
            fixed_velocity: config.fixed_velocity,
            channel: config.output_channel(),
            quantizer,
            rng: Lcg::new(0),
        }
    }

    /// Picks up changed settings, rebuilding the sequence from the notes already held.
    ///
    /// Held notes were quantized with the old scale, so callers should [`clear`][Self::clear] first when the
    /// quantizer changes.
    pub fn reconfigure(&mut self, config: &Config, quantizer: ScaleQuantizer) {
        self.pattern = config.pattern;
        self.octave_range = config.octave_range;
        self.velocity = config.velocity;
        self.fixed_velocity = config.fixed_velocity;
        self.channel = config.output_channel();
        self.quantizer = quantizer;
        self.regenerate();
    }

    /// Reseeds the generator behind [`ArpPattern::Random`].
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Lcg::new(seed);
    }

    /// Adds a note to the chord. Returns whether it was not already held.
    ///
    /// The first note of a new chord restarts the sequence from its beginning.
    pub fn add_note(&mut self, note: Note, velocity: U7) -> bool {
        let note = self.quantizer.quantize(note);
        let starts_chord = self.held.is_empty();
        if !self.held.add(note, velocity) {
            return false;
        }
        if starts_chord {
            self.index = 0;
        }
        self.regenerate();
        debug!("arpeggiating {} notes", self.held.len());
        true
    }

    /// Removes a note from the chord. Returns whether it was held.
    ///
    /// The note is silenced if it is the one sounding; once the chord is empty, whatever still sounds is silenced.
    pub fn remove_note<M: MidiSink, V: VoltageSink>(
        &mut self,
        note: Note,
        midi: &mut MidiOut<M>,
        cv: &mut CvOutput<V>,
    ) -> bool {
        let note = self.quantizer.quantize(note);
        if !self.held.remove(note) {
            return false;
        }
        if self.sounding == Some(note) || self.held.is_empty() {
            self.silence(midi, cv);
        }
        self.regenerate();
        true
    }

    /// Plays the next note of the sequence, releasing the previous one. Returns the note played.
    pub fn step<M: MidiSink, V: VoltageSink>(
        &mut self,
        midi: &mut MidiOut<M>,
        cv: &mut CvOutput<V>,
    ) -> Option<Note> {
        if self.sequence.is_empty() {
            return None;
        }
        self.silence(midi, cv);

        let position = match self.pattern {
            ArpPattern::Random => self.rng.below(self.sequence.len()),
            _ => {
                let position = self.index % self.sequence.len();
                self.index = (position + 1) % self.sequence.len();
                position
            }
        };
        let (note, played) = self.sequence.get(position)?;
        let velocity = match self.velocity {
            VelocityMode::Passthrough => played,
            VelocityMode::Fixed => self.fixed_velocity,
        };

        midi.note_on(self.channel, note, velocity);
        cv.play(note);
        self.sounding = Some(note);
        Some(note)
    }

    /// Silences the sounding note and returns the CV outputs to idle. The chord stays held.
    pub fn panic<M: MidiSink, V: VoltageSink>(
        &mut self,
        midi: &mut MidiOut<M>,
        cv: &mut CvOutput<V>,
    ) {
        self.silence(midi, cv);
        cv.reset();
    }

    /// Silences the sounding note and forgets the chord.
    pub fn clear<M: MidiSink, V: VoltageSink>(
        &mut self,
        midi: &mut MidiOut<M>,
        cv: &mut CvOutput<V>,
    ) {
        self.silence(midi, cv);
        self.held.clear();
        self.index = 0;
        self.regenerate();
    }

    /// Moves back to the first step of the sequence.
    pub fn rewind(&mut self) {
        self.index = 0;
    }

    /// Notes currently held, in arrival order.
    pub fn held(&self) -> &HeldNotes {
        &self.held
    }

    /// The sequence being played.
    pub fn sequence(&self) -> &StepSequence {
        &self.sequence
    }

    /// Position of the next step within the sequence.
    pub fn step_index(&self) -> usize {
        self.index
    }

    /// The note currently sounding, if any.
    pub fn sounding(&self) -> Option<Note> {
        self.sounding
    }

    /// Releases the sounding note, if any, without touching the chord or the sequence position.
    pub fn silence<M: MidiSink, V: VoltageSink>(
        &mut self,
        midi: &mut MidiOut<M>,
        cv: &mut CvOutput<V>,
    ) {
        if let Some(note) = self.sounding.take() {
            midi.note_off(self.channel, note);
            cv.release();
        }
    }

    fn regenerate(&mut self) {
        self.sequence = StepSequence::generate(self.pattern, &self.held, self.octave_range);
        if self.index >= self.sequence.len() {
            self.index = 0;
        }
    }
}

/// 64-bit linear congruential generator; plenty for picking notes.
#[derive(Debug, Clone, Copy)]
struct Lcg(u64);

impl Lcg {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// A value in `0..bound`; `bound` must not be zero.
    fn below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        // low bits of an LCG are weak
        ((self.0 >> 33) % bound as u64) as usize
    }
}
