//! Monophonic CV/gate output.
//!
//! [`VoltageEngine`] keeps its own record of which keys are down, independent of the arpeggiator, and resolves
//! them into one pitch by [`NotePriority`]. Keys are stored as played; quantization applies only to the pitch that
//! wins, so keys that quantize to the same pitch are still released one by one. While the arpeggiator is engaged, the pitch and gate outputs follow its
//! steps instead. Either way the gate is tracked as "a note is sounding" and only converted to an electrical level
//! by [`TriggerPolarity`] at the moment it is written.

mod auxiliary;
pub use auxiliary::*;

mod curve;
pub use curve::*;

use crate::{
    activated_notes::ActiveNoteStack,
    configuration::{Config, NotePriority, ProvideNote, TriggerPolarity},
    output::{CvChannel, VoltageSink},
    translation::ScaleQuantizer,
};
use wmidi::{Note, U7, U14};

/// What drives the pitch and gate outputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Follow {
    /// The held note selected by [`NotePriority`].
    Priority,
    /// Arpeggiator steps.
    Sequencer,
}

impl Follow {
    fn from_config(config: &Config) -> Self {
        if config.arpeggiates() {
            Follow::Sequencer
        } else {
            Follow::Priority
        }
    }
}

/// Drives pitch, gate and auxiliary outputs through a [`VoltageSink`].
///
/// A failed write is counted and skipped; the next write to the same output corrects it.
#[derive(Debug)]
pub struct VoltageEngine<S> {
    sink: S,
    stack: ActiveNoteStack,
    priority: NotePriority,
    quantizer: ScaleQuantizer,
    curve: VoltageCurve,
    polarity: TriggerPolarity,
    follow: Follow,
    /// whether a note is sounding, regardless of polarity
    gate: bool,
    pitch: Option<Note>,
    aux: AuxChannel,
    failures: u32,
}

impl<S: VoltageSink> VoltageEngine<S> {
    /// Takes ownership of `sink` and puts every output in its idle state.
    pub fn new(sink: S, config: &Config) -> Self {
        let ceiling = sink.reference();
        let mut engine = Self {
            sink,
            stack: ActiveNoteStack::new(),
            priority: config.note_priority,
            quantizer: ScaleQuantizer::new(config.scale, config.root),
            curve: VoltageCurve::new(config.cv_profile, ceiling),
            polarity: config.trigger,
            follow: Follow::from_config(config),
            gate: false,
            pitch: None,
            aux: AuxChannel::new(config, ceiling),
            failures: 0,
        };
        engine.reset();
        engine.write_aux(0.0);
        engine
    }

    /// Picks up changed settings, rewriting any output whose level they affect.
    pub fn reconfigure(&mut self, config: &Config) {
        self.priority = config.note_priority;
        self.quantizer = ScaleQuantizer::new(config.scale, config.root);
        self.aux.reconfigure(config);

        let curve = VoltageCurve::new(config.cv_profile, self.sink.reference());
        if curve != self.curve {
            self.curve = curve;
            if let Some(note) = self.pitch {
                self.write_pitch(note);
            }
        }
        if config.trigger != self.polarity {
            self.polarity = config.trigger;
            self.write_gate(self.gate);
        }

        let follow = Follow::from_config(config);
        if follow != self.follow {
            debug!("CV now follows {}", follow);
            self.follow = follow;
            // whatever the other path left sounding is stale
            self.write_gate(false);
        }
        if self.follow == Follow::Priority {
            self.resolve();
        }
    }

    /// Registers a key press. Returns whether the note was not already held.
    pub fn add_note(&mut self, note: Note, velocity: U7) -> bool {
        if let Some(volts) = self.aux.velocity(velocity) {
            self.write_aux(volts);
        }
        let added = self.stack.add(note, velocity);
        if added && self.follow == Follow::Priority {
            self.resolve();
        }
        added
    }

    /// Registers a key release. Returns whether the note was held.
    pub fn remove_note(&mut self, note: Note) -> bool {
        let removed = self.stack.remove(note);
        if removed && self.follow == Follow::Priority {
            self.resolve();
        }
        removed
    }

    /// Forgets every held key.
    pub fn clear_notes(&mut self) {
        self.stack.clear();
        if self.follow == Follow::Priority {
            self.resolve();
        }
    }

    /// Selects the note to voice from those held, per the configured [`NotePriority`], and drives the outputs to
    /// match.
    ///
    /// The gate stays asserted as long as anything is held, so a change of pitch does not retrigger it. When
    /// nothing is held the gate closes and the pitch holds its last value, letting a release tail ring out.
    pub fn resolve(&mut self) -> Option<Note> {
        let resolved = self.resolved();
        match resolved {
            Some(note) => {
                if self.pitch != Some(note) {
                    self.write_pitch(note);
                }
                if !self.gate {
                    self.write_gate(true);
                }
            }
            None => {
                if self.gate {
                    self.write_gate(false);
                }
            }
        }
        resolved
    }

    /// The note [`NotePriority`] selects among the held keys, quantized, without touching the outputs.
    pub fn resolved(&self) -> Option<Note> {
        self.priority
            .provide_note(self.stack.iter())
            .map(|note| self.quantizer.quantize(note))
    }

    /// Plays an arpeggiator step: pitch first, then the gate. Ignored unless following the sequencer.
    pub fn play(&mut self, note: Note) {
        if self.follow == Follow::Sequencer {
            self.write_pitch(note);
            self.write_gate(true);
        }
    }

    /// Ends an arpeggiator step. Ignored unless following the sequencer.
    pub fn release(&mut self) {
        if self.follow == Follow::Sequencer {
            self.write_gate(false);
        }
    }

    /// Feeds a control change to the auxiliary channel.
    pub fn control_change(&mut self, control: U7, value: U7) {
        if let Some(volts) = self.aux.control_change(control, value) {
            self.write_aux(volts);
        }
    }

    /// Feeds channel pressure to the auxiliary channel.
    pub fn channel_pressure(&mut self, value: U7) {
        if let Some(volts) = self.aux.channel_pressure(value) {
            self.write_aux(volts);
        }
    }

    /// Feeds pitch bend to the auxiliary channel.
    pub fn pitch_bend(&mut self, value: U14) {
        if let Some(volts) = self.aux.pitch_bend(value) {
            self.write_aux(volts);
        }
    }

    /// See [`AuxChannel::learn`].
    pub fn learn(&mut self) {
        self.aux.learn();
    }

    /// Closes the gate and returns pitch CV to 0 V. Held keys are kept.
    pub fn reset(&mut self) {
        self.write_gate(false);
        self.pitch = None;
        self.set_voltage(CvChannel::Pitch, 0.0);
    }

    /// Whether a note is sounding.
    pub fn gate(&self) -> bool {
        self.gate
    }

    /// The note pitch CV was last set to.
    pub fn pitch(&self) -> Option<Note> {
        self.pitch
    }

    /// What drives the pitch and gate outputs.
    pub fn follow(&self) -> Follow {
        self.follow
    }

    /// The auxiliary channel.
    pub fn aux(&self) -> &AuxChannel {
        &self.aux
    }

    /// Number of writes the sink rejected.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Borrows the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn write_pitch(&mut self, note: Note) {
        self.pitch = Some(note);
        let volts = self.curve.voltage(note).as_volts() as f32;
        self.set_voltage(CvChannel::Pitch, volts);
    }

    fn write_gate(&mut self, sounding: bool) {
        self.gate = sounding;
        let level = self.polarity.level(sounding);
        if self.sink.set_gate(CvChannel::Gate, level).is_err() {
            self.failed();
        }
    }

    fn write_aux(&mut self, volts: f32) {
        self.set_voltage(CvChannel::Aux, volts);
    }

    fn set_voltage(&mut self, channel: CvChannel, volts: f32) {
        if self.sink.set_voltage(channel, volts).is_err() {
            self.failed();
        }
    }

    fn failed(&mut self) {
        self.failures = self.failures.wrapping_add(1);
        warn!("CV write failed");
    }
}

/// A [`VoltageEngine`] which may not exist.
///
/// Without CV hardware every call is accepted and does nothing, so the rest of the signal path never has to ask.
#[derive(Debug)]
pub struct CvOutput<S> {
    engine: Option<VoltageEngine<S>>,
}

impl<S: VoltageSink> CvOutput<S> {
    /// Wraps `sink`, or nothing if probing for the hardware failed.
    pub fn new(sink: Option<S>, config: &Config) -> Self {
        if sink.is_none() {
            warn!("No CV hardware; voltage outputs disabled");
        }
        Self {
            engine: sink.map(|sink| VoltageEngine::new(sink, config)),
        }
    }

    /// Whether CV hardware is attached.
    pub fn is_present(&self) -> bool {
        self.engine.is_some()
    }

    /// The engine, if CV hardware is attached.
    pub fn engine(&self) -> Option<&VoltageEngine<S>> {
        self.engine.as_ref()
    }

    /// See [`VoltageEngine::reconfigure`].
    pub fn reconfigure(&mut self, config: &Config) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reconfigure(config);
        }
    }

    /// See [`VoltageEngine::add_note`].
    pub fn add_note(&mut self, note: Note, velocity: U7) -> bool {
        self.engine
            .as_mut()
            .is_some_and(|engine| engine.add_note(note, velocity))
    }

    /// See [`VoltageEngine::remove_note`].
    pub fn remove_note(&mut self, note: Note) -> bool {
        self.engine
            .as_mut()
            .is_some_and(|engine| engine.remove_note(note))
    }

    /// See [`VoltageEngine::clear_notes`].
    pub fn clear_notes(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear_notes();
        }
    }

    /// See [`VoltageEngine::play`].
    pub fn play(&mut self, note: Note) {
        if let Some(engine) = self.engine.as_mut() {
            engine.play(note);
        }
    }

    /// See [`VoltageEngine::release`].
    pub fn release(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.release();
        }
    }

    /// See [`VoltageEngine::control_change`].
    pub fn control_change(&mut self, control: U7, value: U7) {
        if let Some(engine) = self.engine.as_mut() {
            engine.control_change(control, value);
        }
    }

    /// See [`VoltageEngine::channel_pressure`].
    pub fn channel_pressure(&mut self, value: U7) {
        if let Some(engine) = self.engine.as_mut() {
            engine.channel_pressure(value);
        }
    }

    /// See [`VoltageEngine::pitch_bend`].
    pub fn pitch_bend(&mut self, value: U14) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pitch_bend(value);
        }
    }

    /// See [`VoltageEngine::learn`].
    pub fn learn(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.learn();
        }
    }

    /// See [`VoltageEngine::reset`].
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
    }

    /// Last auxiliary output in volts; 0 without hardware.
    pub fn aux_volts(&self) -> f32 {
        self.engine
            .as_ref()
            .map_or(0.0, |engine| engine.aux().output())
    }

    /// Controller captured by learn mode.
    pub fn learned_control(&self) -> Option<U7> {
        self.engine
            .as_ref()
            .and_then(|engine| engine.aux().learned())
    }

    /// Number of writes the hardware rejected.
    pub fn failures(&self) -> u32 {
        self.engine.as_ref().map_or(0, VoltageEngine::failures)
    }
}
