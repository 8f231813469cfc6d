//! Ties the clock, pipeline, arpeggiator and CV outputs together behind a single object the scheduler drives.

mod status;
pub use status::*;

use crate::{
    activated_notes::GM2_SIMUL_NOTE_NUM,
    arpeggiator::Arpeggiator,
    clock::{ClockSource, StepDue},
    configuration::{ClockSourceKind, Config},
    event::Event,
    output::{MidiOut, MidiSink, VoltageSink},
    translation::Pipeline,
    voltage::CvOutput,
};
use bitmask_enum::bitmask;
use embassy_time::Instant;
use tinyvec::ArrayVec;
use wmidi::{Note, U7};

/// MIDI CC 123: All Notes Off
const ALL_NOTES_OFF: U7 = U7::from_u8_lossy(123);

/// Operations that may be performed while handling an event, polling or reconfiguring.
#[bitmask(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// A note was added or removed.
    NoteChange,
    /// The arpeggiator advanced.
    Step,
    /// The auxiliary CV channel received input.
    AuxChange,
    /// The external clock started, stopped or continued.
    Transport,
    /// New configuration was applied.
    ConfigChange,
}

/// Owns every component and both outputs.
///
/// Nothing in here waits or reads the time; the caller passes `now` in and schedules the next call with
/// [`next_deadline`][Self::next_deadline].
pub struct Hub<M, V> {
    config: Config,
    clock: ClockSource,
    pipeline: Pipeline,
    arpeggiator: Arpeggiator,
    cv: CvOutput<V>,
    midi: MidiOut<M>,
    /// keys physically down, one bit per pitch
    pressed: u128,
    fault: Option<Fault>,
    discontinuities: u32,
    failures: u32,
}

impl<M: MidiSink, V: VoltageSink> Hub<M, V> {
    /// Assembles the signal path. `cv` is `None` when no CV hardware was found.
    pub fn new(config: Config, midi: M, cv: Option<V>, now: Instant) -> Self {
        let mut fault = None;
        if cv.is_none() {
            fault = Some(Fault::HardwareAbsent);
        }
        let sanitized = config.sanitized();
        if sanitized != config {
            fault = Some(Fault::InvalidConfiguration);
        }
        let pipeline = Pipeline::new(&sanitized);
        let mut arpeggiator = Arpeggiator::new(&sanitized, pipeline.quantizer());
        arpeggiator.reseed(now.as_ticks());

        Self {
            config: sanitized,
            clock: ClockSource::new(&sanitized, now),
            pipeline,
            arpeggiator,
            cv: CvOutput::new(cv, &sanitized),
            midi: MidiOut::new(midi),
            pressed: 0,
            fault,
            discontinuities: 0,
            failures: 0,
        }
    }

    /// Applies new configuration.
    ///
    /// Changing the scale, the output channel, or switching the arpeggiator on or off releases everything that is
    /// sounding, since notes already held were translated under the old settings.
    pub fn reconfigure(&mut self, config: &Config, now: Instant) -> Operation {
        let sanitized = config.sanitized();
        if sanitized != *config {
            self.fault = Some(Fault::InvalidConfiguration);
        }
        if sanitized == self.config {
            return Operation::none();
        }

        let old = self.config;
        let requantize = (sanitized.quantizes() || old.quantizes())
            && Pipeline::new(&sanitized).quantizer() != self.pipeline.quantizer();
        let retranslate = requantize
            || sanitized.arpeggiates() != old.arpeggiates()
            || sanitized.output_channel() != old.output_channel();
        if retranslate {
            self.release_all();
        } else if old.latch && !sanitized.latch {
            self.unlatch();
        }

        self.config = sanitized;
        self.pipeline.reconfigure(&sanitized);
        self.clock.reconfigure(&sanitized, now);
        self.arpeggiator
            .reconfigure(&sanitized, self.pipeline.quantizer());
        self.cv.reconfigure(&sanitized);
        info!("Configuration applied");

        self.note_faults();
        Operation::ConfigChange
    }

    /// Reacts to a single inbound event. Channel messages on other channels are ignored.
    pub fn handle(&mut self, event: Event, now: Instant) -> Operation {
        if event
            .channel()
            .is_some_and(|channel| !self.config.accepts(channel))
        {
            return Operation::none();
        }

        let mut operation = Operation::none();
        match event {
            Event::NoteOn { note, velocity, .. } => {
                self.note_on(note, velocity);
                operation |= Operation::NoteChange;
            }
            Event::NoteOff { note, .. } => {
                self.note_off(note);
                operation |= Operation::NoteChange;
            }
            Event::ControlChange { control, value, .. } => {
                self.cv.control_change(control, value);
                operation |= Operation::AuxChange;
            }
            Event::ChannelPressure { value, .. } => {
                self.cv.channel_pressure(value);
                operation |= Operation::AuxChange;
            }
            Event::PitchBend { value, .. } => {
                self.cv.pitch_bend(value);
                operation |= Operation::AuxChange;
            }
            Event::Start | Event::Stop | Event::Continue | Event::Clock => {
                if let Some(due) = self.clock.handle(event, now) {
                    self.step(due);
                    operation |= Operation::Step;
                }
                if event != Event::Clock && self.clock.kind() == ClockSourceKind::External {
                    operation |= Operation::Transport;
                    match event {
                        Event::Start => self.arpeggiator.rewind(),
                        Event::Stop => self.arpeggiator.silence(&mut self.midi, &mut self.cv),
                        _ => {}
                    }
                }
            }
        }

        self.note_faults();
        operation
    }

    /// Plays every step that has come due by `now`.
    pub fn poll(&mut self, now: Instant) -> Operation {
        let mut operation = Operation::none();
        while let Some(due) = self.clock.poll(now) {
            self.step(due);
            operation |= Operation::Step;
        }
        self.note_faults();
        operation
    }

    /// When [`poll`][Self::poll] next has work to do, if ever without further events.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.clock.next_deadline()
    }

    /// Silences everything, forgets every held note and returns CV to idle.
    pub fn panic(&mut self) -> Operation {
        warn!("Panic: all notes off");
        self.release_all();
        self.arpeggiator.panic(&mut self.midi, &mut self.cv);
        self.note_faults();
        Operation::NoteChange
    }

    /// Puts the auxiliary channel in learn mode.
    pub fn learn_aux(&mut self) -> Operation {
        self.cv.learn();
        Operation::AuxChange
    }

    /// A snapshot for displays and logs.
    pub fn status(&self) -> Status {
        Status {
            bpm: self.clock.bpm(),
            running: self.clock.is_running(),
            clock_source: self.clock.kind(),
            pattern: self.config.pattern,
            held: if self.pipeline.arpeggiates() {
                self.arpeggiator.held().len()
            } else {
                self.pressed.count_ones() as usize
            },
            step_index: self.arpeggiator.step_index(),
            sounding: self.arpeggiator.sounding(),
            aux_volts: self.cv.aux_volts(),
            learned_control: self.cv.learned_control(),
            cv_present: self.cv.is_present(),
            dropped_midi: self.midi.failures(),
            dropped_cv: self.cv.failures(),
            fault: self.fault,
        }
    }

    /// The configuration in effect, after clamping.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The arpeggiator.
    pub fn arpeggiator(&self) -> &Arpeggiator {
        &self.arpeggiator
    }

    /// The CV outputs.
    pub fn cv(&self) -> &CvOutput<V> {
        &self.cv
    }

    /// The MIDI output.
    pub fn midi(&self) -> &MidiOut<M> {
        &self.midi
    }

    fn note_on(&mut self, note: Note, velocity: U7) {
        let bit = 1_u128 << (note as u8);
        if self.pressed & bit != 0 {
            return;
        }
        let first_press = self.pressed == 0;
        let translated = self.translate(note);
        let shared = self.is_pressed(translated);
        self.pressed |= bit;

        self.cv.add_note(note, velocity);
        if self.pipeline.arpeggiates() {
            if self.config.latch && first_press {
                self.arpeggiator.clear(&mut self.midi, &mut self.cv);
            }
            self.arpeggiator.add_note(translated, velocity);
        } else if !shared {
            self.midi
                .note_on(self.config.output_channel(), translated, velocity);
        }
    }

    fn note_off(&mut self, note: Note) {
        let bit = 1_u128 << (note as u8);
        if self.pressed & bit == 0 {
            return;
        }
        self.pressed &= !bit;

        self.cv.remove_note(note);
        let translated = self.translate(note);
        // another key still down may have been quantized to the same pitch
        if self.is_pressed(translated) {
            return;
        }
        if self.pipeline.arpeggiates() {
            if !self.config.latch {
                self.arpeggiator
                    .remove_note(translated, &mut self.midi, &mut self.cv);
            }
        } else {
            self.midi.note_off(self.config.output_channel(), translated);
        }
    }

    fn translate(&self, note: Note) -> Note {
        self.pipeline.process(note, U7::from_u8_lossy(0))
    }

    /// Whether any key currently down translates to `translated`.
    fn is_pressed(&self, translated: Note) -> bool {
        (0..128_u8)
            .filter(|&pitch| self.pressed & (1_u128 << pitch) != 0)
            .any(|pitch| self.translate(Note::from_u8_lossy(pitch)) == translated)
    }

    /// Drops every latched note whose key is no longer down.
    fn unlatch(&mut self) {
        let released: ArrayVec<[u8; GM2_SIMUL_NOTE_NUM]> = self
            .arpeggiator
            .held()
            .iter()
            .filter(|&note| !self.is_pressed(note))
            .map(u8::from)
            .collect();
        for pitch in released {
            self.arpeggiator
                .remove_note(Note::from_u8_lossy(pitch), &mut self.midi, &mut self.cv);
        }
    }

    fn step(&mut self, due: StepDue) {
        if !self.pipeline.arpeggiates() {
            return;
        }
        if let Some(note) = self.arpeggiator.step(&mut self.midi, &mut self.cv) {
            debug!("step {}: {}", due.step, note.to_str());
        }
    }

    /// Forgets every key and note, on the channel currently configured.
    fn release_all(&mut self) {
        self.arpeggiator.clear(&mut self.midi, &mut self.cv);
        self.cv.clear_notes();
        if !self.pipeline.arpeggiates() && self.pressed != 0 {
            // passed-through notes are not tracked individually
            self.midi.control_change(
                self.config.output_channel(),
                ALL_NOTES_OFF,
                U7::from_u8_lossy(0),
            );
        }
        self.pressed = 0;
    }

    fn note_faults(&mut self) {
        let discontinuities = self.clock.discontinuities();
        if discontinuities != self.discontinuities {
            self.discontinuities = discontinuities;
            self.fault = Some(Fault::TempoDiscontinuity);
        }
        let failures = self.midi.failures().wrapping_add(self.cv.failures());
        if failures != self.failures {
            self.failures = failures;
            self.fault = Some(Fault::TransientIo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configuration::{ArpPattern, Scale},
        output::{
            CvChannel,
            mock::{RecordingCv, RecordingMidi},
        },
    };
    use embassy_time::Duration;
    use std::vec::Vec;
    use wmidi::{Channel, MidiMessage};

    const VELOCITY: U7 = U7::from_u8_lossy(100);

    fn hub(config: Config) -> Hub<RecordingMidi, RecordingCv> {
        Hub::new(
            config,
            RecordingMidi::default(),
            Some(RecordingCv::default()),
            Instant::from_millis(0),
        )
    }

    fn note_on(pitch: u8) -> Event {
        Event::NoteOn {
            channel: Channel::Ch1,
            note: Note::from_u8_lossy(pitch),
            velocity: VELOCITY,
        }
    }

    fn note_off(pitch: u8) -> Event {
        Event::NoteOff {
            channel: Channel::Ch1,
            note: Note::from_u8_lossy(pitch),
        }
    }

    fn played(hub: &Hub<RecordingMidi, RecordingCv>) -> Vec<u8> {
        hub.midi()
            .sink()
            .sent
            .iter()
            .filter_map(|message| match message {
                MidiMessage::NoteOn(_, note, _) => Some(*note as u8),
                _ => None,
            })
            .collect()
    }

    /// Polls every millisecond up to `until`.
    fn run(hub: &mut Hub<RecordingMidi, RecordingCv>, until: u64) {
        for millis in 0..=until {
            hub.poll(Instant::from_millis(millis));
        }
    }

    #[test]
    fn arpeggiates_on_the_internal_clock() {
        let mut hub = hub(Config::default());
        let now = Instant::from_millis(0);
        for pitch in [60, 64, 67] {
            hub.handle(note_on(pitch), now);
        }

        // a sixteenth at 120 BPM is 125 ms
        run(&mut hub, 500);
        assert_eq!(std::vec![60, 64, 67, 60], played(&hub), "Expected left but got right");
    }

    #[test]
    fn passes_quantized_notes_through_when_bypassed() {
        let mut hub = hub(Config {
            octave_range: 0,
            scale: Scale::Major,
            ..Config::default()
        });
        let now = Instant::from_millis(0);
        hub.handle(note_on(61), now);
        hub.handle(note_off(61), now);

        assert_eq!(
            std::vec![
                MidiMessage::NoteOn(Channel::Ch1, Note::C4, VELOCITY),
                MidiMessage::NoteOff(Channel::Ch1, Note::C4, U7::from_u8_lossy(0)),
            ],
            hub.midi().sink().sent,
            "Expected left but got right"
        );
        run(&mut hub, 500);
        assert_eq!(2, hub.midi().sink().sent.len(), "Expected left but got right");
    }

    mod shared_pitch {
        use super::*;

        fn quantized(octave_range: u8) -> Hub<RecordingMidi, RecordingCv> {
            hub(Config {
                octave_range,
                scale: Scale::Major,
                ..Config::default()
            })
        }

        #[test]
        fn gate_holds_until_the_last_key_is_released() {
            let mut hub = quantized(0);
            let now = Instant::from_millis(0);
            // C# quantizes down to C in C major
            hub.handle(note_on(60), now);
            hub.handle(note_on(61), now);
            hub.handle(note_off(61), now);

            let engine = hub.cv().engine();
            assert_eq!(Some(true), engine.map(|engine| engine.gate()), "Expected left but got right");
            assert_eq!(
                Some(Some(true)),
                engine.map(|engine| engine.sink().gate(CvChannel::Gate)),
                "Expected left but got right"
            );
            assert_eq!(
                Some(Some(Note::C4)),
                engine.map(|engine| engine.pitch()),
                "Expected left but got right"
            );

            hub.handle(note_off(60), now);
            assert_eq!(
                Some(false),
                hub.cv().engine().map(|engine| engine.gate()),
                "Expected left but got right"
            );
        }

        #[test]
        fn thru_sends_one_note_per_pitch() {
            let mut hub = quantized(0);
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_on(61), now);
            hub.handle(note_off(61), now);
            assert_eq!(
                std::vec![MidiMessage::NoteOn(Channel::Ch1, Note::C4, VELOCITY)],
                hub.midi().sink().sent,
                "Expected left but got right"
            );

            hub.handle(note_off(60), now);
            assert_eq!(
                Some(&MidiMessage::NoteOff(Channel::Ch1, Note::C4, U7::from_u8_lossy(0))),
                hub.midi().sink().sent.last(),
                "Expected left but got right"
            );
            assert_eq!(2, hub.midi().sink().sent.len(), "Expected left but got right");
        }

        #[test]
        fn arpeggiator_keeps_the_pitch_while_a_key_is_down() {
            let mut hub = quantized(1);
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_on(61), now);
            hub.handle(note_off(61), now);

            assert_eq!(1, hub.arpeggiator().held().len(), "Expected left but got right");
            assert!(hub.arpeggiator().held().contains(Note::C4));

            hub.handle(note_off(60), now);
            assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
        }
    }

    #[test]
    fn held_count_follows_keys_when_bypassed() {
        let mut hub = hub(Config {
            octave_range: 0,
            ..Config::default()
        });
        let now = Instant::from_millis(0);
        hub.handle(note_on(60), now);
        hub.handle(note_on(64), now);
        assert_eq!(2, hub.status().held, "Expected left but got right");

        hub.handle(note_off(60), now);
        assert_eq!(1, hub.status().held, "Expected left but got right");
    }

    #[test]
    fn ignores_other_channels() {
        let mut hub = hub(Config {
            channel: Some(Channel::Ch2),
            ..Config::default()
        });
        let operation = hub.handle(note_on(60), Instant::from_millis(0));

        assert!(operation.is_none());
        assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
    }

    #[test]
    fn transmits_on_the_configured_channel() {
        let mut hub = hub(Config {
            channel: Some(Channel::Ch5),
            ..Config::default()
        });
        hub.handle(
            Event::NoteOn {
                channel: Channel::Ch5,
                note: Note::C4,
                velocity: VELOCITY,
            },
            Instant::from_millis(0),
        );
        run(&mut hub, 130);

        assert_eq!(
            Some(&MidiMessage::NoteOn(Channel::Ch5, Note::C4, VELOCITY)),
            hub.midi().sink().sent.first(),
            "Expected left but got right"
        );
    }

    mod latch {
        use super::*;

        fn latched() -> Hub<RecordingMidi, RecordingCv> {
            hub(Config {
                latch: true,
                ..Config::default()
            })
        }

        #[test]
        fn keeps_notes_after_release() {
            let mut hub = latched();
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_on(64), now);
            hub.handle(note_off(60), now);
            hub.handle(note_off(64), now);

            assert_eq!(2, hub.arpeggiator().held().len(), "Expected left but got right");
        }

        #[test]
        fn new_chord_after_full_release() {
            let mut hub = latched();
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_on(64), now);
            hub.handle(note_off(60), now);
            // 64 is still down, so this adds to the chord
            hub.handle(note_on(67), now);
            assert_eq!(3, hub.arpeggiator().held().len(), "Expected left but got right");

            hub.handle(note_off(64), now);
            hub.handle(note_off(67), now);
            hub.handle(note_on(62), now);
            assert_eq!(1, hub.arpeggiator().held().len(), "Expected left but got right");
            assert!(hub.arpeggiator().held().contains(Note::D4));
        }

        #[test]
        fn unlatching_drops_released_keys() {
            let config = Config {
                latch: true,
                ..Config::default()
            };
            let mut hub = hub(config);
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_on(64), now);
            hub.handle(note_off(60), now);

            hub.reconfigure(
                &Config {
                    latch: false,
                    ..config
                },
                now,
            );
            assert_eq!(1, hub.arpeggiator().held().len(), "Expected left but got right");
            assert!(hub.arpeggiator().held().contains(Note::E4));

            hub.handle(note_off(64), now);
            assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
            run(&mut hub, 600);
            assert!(played(&hub).is_empty());
        }

        #[test]
        fn unlatching_with_nothing_down_clears_the_chord() {
            let config = Config {
                latch: true,
                ..Config::default()
            };
            let mut hub = hub(config);
            let now = Instant::from_millis(0);
            hub.handle(note_on(60), now);
            hub.handle(note_off(60), now);

            hub.reconfigure(
                &Config {
                    latch: false,
                    ..config
                },
                now,
            );
            assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
        }
    }

    mod external_clock {
        use super::*;

        fn external() -> Hub<RecordingMidi, RecordingCv> {
            hub(Config {
                clock_source: ClockSourceKind::External,
                ..Config::default()
            })
        }

        /// Sends `pulses` clock messages 20.833 ms apart (120 BPM), starting at `from` milliseconds.
        fn pulses(hub: &mut Hub<RecordingMidi, RecordingCv>, from: u64, pulses: u64) -> Operation {
            let mut operation = Operation::none();
            for n in 0..pulses {
                let at = Instant::from_micros(from * 1000 + n * 20_833);
                operation |= hub.handle(Event::Clock, at);
            }
            operation
        }

        #[test]
        fn steps_follow_the_clock() {
            let mut hub = external();
            hub.handle(note_on(60), Instant::from_millis(0));
            hub.handle(note_on(64), Instant::from_millis(0));

            assert!(pulses(&mut hub, 0, 12).is_none());
            assert!(hub.handle(Event::Start, Instant::from_millis(300)).contains(Operation::Transport));
            // thirteen pulses make the twelve intervals a tempo estimate needs
            let operation = pulses(&mut hub, 301, 13);

            assert!(operation.contains(Operation::Step));
            assert_eq!(std::vec![60, 64], played(&hub), "Expected left but got right");
            assert_eq!(Some(120), hub.status().bpm, "Expected left but got right");
        }

        #[test]
        fn stop_silences_the_arpeggiator() {
            let mut hub = external();
            hub.handle(note_on(60), Instant::from_millis(0));
            hub.handle(Event::Start, Instant::from_millis(0));
            pulses(&mut hub, 1, 6);
            assert_eq!(Some(Note::C4), hub.arpeggiator().sounding(), "Expected left but got right");

            hub.handle(Event::Stop, Instant::from_millis(200));
            assert_eq!(None, hub.arpeggiator().sounding(), "Expected left but got right");
            assert!(!hub.status().running);
        }

        #[test]
        fn tempo_jump_is_reported() {
            let mut hub = external();
            hub.handle(Event::Start, Instant::from_millis(0));
            pulses(&mut hub, 1, 24);
            assert_eq!(None, hub.status().fault, "Expected left but got right");

            // a pulse arriving at twice the tempo
            let last = Instant::from_micros(1000 + 23 * 20_833);
            hub.handle(Event::Clock, last + Duration::from_micros(10_416));
            assert_eq!(
                Some(Fault::TempoDiscontinuity),
                hub.status().fault,
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn scale_change_releases_held_notes() {
        let config = Config::default();
        let mut hub = hub(config);
        hub.handle(note_on(60), Instant::from_millis(0));
        run(&mut hub, 130);
        assert_eq!(Some(Note::C4), hub.arpeggiator().sounding(), "Expected left but got right");

        let operation = hub.reconfigure(
            &Config {
                scale: Scale::Minor,
                ..config
            },
            Instant::from_millis(131),
        );
        assert!(operation.contains(Operation::ConfigChange));
        assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
        assert_eq!(None, hub.arpeggiator().sounding(), "Expected left but got right");
    }

    #[test]
    fn pattern_change_keeps_held_notes() {
        let config = Config::default();
        let mut hub = hub(config);
        hub.handle(note_on(60), Instant::from_millis(0));
        hub.handle(note_on(64), Instant::from_millis(0));

        hub.reconfigure(
            &Config {
                pattern: ArpPattern::Down,
                ..config
            },
            Instant::from_millis(1),
        );
        assert_eq!(2, hub.arpeggiator().held().len(), "Expected left but got right");
        assert_eq!(ArpPattern::Down, hub.status().pattern, "Expected left but got right");
    }

    #[test]
    fn unchanged_configuration_is_a_no_op() {
        let mut hub = hub(Config::default());
        assert!(hub.reconfigure(&Config::default(), Instant::from_millis(1)).is_none());
    }

    #[test]
    fn out_of_range_configuration_is_clamped() {
        let mut hub = hub(Config::default());
        hub.reconfigure(
            &Config {
                bpm: 1000,
                ..Config::default()
            },
            Instant::from_millis(1),
        );
        assert_eq!(300, hub.config().bpm, "Expected left but got right");
        assert_eq!(
            Some(Fault::InvalidConfiguration),
            hub.status().fault,
            "Expected left but got right"
        );
    }

    #[test]
    fn panic_releases_everything() {
        let mut hub = hub(Config::default());
        hub.handle(note_on(60), Instant::from_millis(0));
        run(&mut hub, 130);

        hub.panic();
        assert_eq!(0, hub.arpeggiator().held().len(), "Expected left but got right");
        assert_eq!(None, hub.arpeggiator().sounding(), "Expected left but got right");
        let cv = hub.cv().engine().map(|engine| engine.sink());
        assert_eq!(
            Some(Some(0.0)),
            cv.map(|sink| sink.voltage(CvChannel::Pitch)),
            "Expected left but got right"
        );
        assert_eq!(
            Some(Some(false)),
            cv.map(|sink| sink.gate(CvChannel::Gate)),
            "Expected left but got right"
        );

        run(&mut hub, 1000);
        assert_eq!(std::vec![60], played(&hub), "Expected left but got right");
    }

    #[test]
    fn runs_without_cv_hardware() {
        let mut hub = Hub::<RecordingMidi, RecordingCv>::new(
            Config::default(),
            RecordingMidi::default(),
            None,
            Instant::from_millis(0),
        );
        hub.handle(note_on(60), Instant::from_millis(0));
        run(&mut hub, 130);

        let status = hub.status();
        assert!(!status.cv_present);
        assert_eq!(Some(Fault::HardwareAbsent), status.fault, "Expected left but got right");
        assert_eq!(std::vec![60], played(&hub), "Expected left but got right");
    }

    #[test]
    fn failed_sends_are_reported() {
        let mut midi = RecordingMidi::default();
        midi.fail = true;
        let mut hub = Hub::new(
            Config::default(),
            midi,
            Some(RecordingCv::default()),
            Instant::from_millis(0),
        );
        hub.handle(note_on(60), Instant::from_millis(0));
        run(&mut hub, 130);

        let status = hub.status();
        assert_eq!(1, status.dropped_midi, "Expected left but got right");
        assert_eq!(Some(Fault::TransientIo), status.fault, "Expected left but got right");
        // CV keeps going regardless
        assert_eq!(Some(Note::C4), hub.arpeggiator().sounding(), "Expected left but got right");
    }

    #[test]
    fn aux_learn() {
        let mut hub = hub(Config::default());
        hub.learn_aux();
        hub.handle(
            Event::ControlChange {
                channel: Channel::Ch1,
                control: U7::from_u8_lossy(1),
                value: U7::from_u8_lossy(127),
            },
            Instant::from_millis(0),
        );

        let status = hub.status();
        assert_eq!(Some(U7::from_u8_lossy(1)), status.learned_control, "Expected left but got right");
        assert!(status.aux_volts > 0.0);
    }
}
