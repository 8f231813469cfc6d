//! Timing: an internal step generator and external MIDI clock ingestion, both reduced to "step due" events.
//!
//! Nothing here reads a clock. Every method takes the current [`Instant`] from its caller, which keeps the logic
//! deterministic under test and lets the scheduler decide when to poll ([`ClockSource::next_deadline`]).

mod tempo;
pub use tempo::*;

mod tempo_estimator;
pub use tempo_estimator::*;

use crate::{
    configuration::{ClockSourceKind, Config},
    event::Event,
};
use embassy_time::{Duration, Instant};

/// How long an external clock may go quiet before its tempo estimate is discarded.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(2);

/// A single clock pulse.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    /// Pulses since the clock started, counting this one from 1.
    pub index: u64,
    /// Where the pulse came from.
    pub source: ClockSourceKind,
    /// When the pulse was due (internal) or arrived (external).
    pub timestamp: Instant,
}

/// Emitted when a pulse completes a step.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepDue {
    /// Steps since the clock started, counting this one from 1.
    pub step: u32,
    /// The pulse that completed the step.
    pub tick: Tick,
}

/// Produces steps from either the internal generator or an external MIDI clock.
///
/// Steps come in two-step pairs so swing can lengthen the first and shorten the second. Internally, every pulse is
/// scheduled at an exact offset from an anchor, so late polls never push later pulses back. Externally, swing moves
/// the boundary between the two steps of a pair by whole pulses.
#[derive(Clone, Copy, Debug)]
pub struct ClockSource {
    kind: ClockSourceKind,
    tempo: Tempo,
    running: bool,
    /// pulses into the current two-step pair
    pair_pulse: u32,
    pulse_index: u64,
    step_index: u32,
    /// instant of a pulse whose phase within its pair was `anchor_phase`
    anchor: Instant,
    anchor_phase: u32,
    since_anchor: u64,
    estimator: TempoEstimator,
    last_pulse: Option<Instant>,
    discontinuities: u32,
}

impl ClockSource {
    /// Creates a clock. An internal clock starts running immediately; an external one waits for a start message.
    pub fn new(config: &Config, now: Instant) -> Self {
        let config = config.sanitized();
        let mut clock = Self {
            kind: config.clock_source,
            tempo: Tempo::from_config(&config),
            running: false,
            pair_pulse: 0,
            pulse_index: 0,
            step_index: 0,
            anchor: now,
            anchor_phase: 0,
            since_anchor: 0,
            estimator: TempoEstimator::new(),
            last_pulse: None,
            discontinuities: 0,
        };
        clock.switch_source(now);
        clock
    }

    /// Applies new settings. Changing tempo, rate, swing or division keeps the clock's phase; changing the source
    /// starts over.
    pub fn reconfigure(&mut self, config: &Config, now: Instant) {
        let config = config.sanitized();
        let tempo = Tempo::from_config(&config);
        if config.clock_source != self.kind {
            info!("Switching clock source");
            self.kind = config.clock_source;
            self.tempo = tempo;
            self.switch_source(now);
            return;
        }
        if tempo == self.tempo {
            return;
        }
        let last_fire = self.last_fire();
        self.tempo = tempo;
        self.pair_pulse %= self.pair_len();
        self.anchor = last_fire;
        self.anchor_phase = self.pair_pulse;
        self.since_anchor = 0;
        debug!("Clock re-anchored at phase {}", self.anchor_phase);
    }

    fn switch_source(&mut self, now: Instant) {
        self.reset();
        if self.kind == ClockSourceKind::Internal {
            self.start(now);
        }
    }

    /// Starts (or restarts) counting from the beginning of a pair.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.pair_pulse = 0;
        self.anchor = now;
        self.anchor_phase = 0;
        self.since_anchor = 0;
        self.last_pulse = None;
    }

    /// Stops producing steps and rewinds the pulse counter.
    pub fn stop(&mut self) {
        self.running = false;
        self.pair_pulse = 0;
        self.last_pulse = None;
    }

    /// Returns to the power-on state: stopped, counters cleared, no tempo estimate.
    pub fn reset(&mut self) {
        self.stop();
        self.pulse_index = 0;
        self.step_index = 0;
        self.estimator.reset();
    }

    /// Whether steps are being produced.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Active source.
    pub fn kind(&self) -> ClockSourceKind {
        self.kind
    }

    /// Current timing settings.
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Tempo to show the performer: the configured tempo internally, the estimate externally (`None` while unsynced).
    pub fn bpm(&self) -> Option<u16> {
        match self.kind {
            ClockSourceKind::Internal => Some(self.tempo.bpm()),
            ClockSourceKind::External => self.estimator.bpm(),
        }
    }

    /// Steps produced since the clock was reset.
    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    /// Number of abrupt external tempo changes seen so far.
    pub fn discontinuities(&self) -> u32 {
        self.discontinuities
    }

    /// When the scheduler should next call [`poll`][Self::poll]; `None` if only new events can produce work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.kind, self.running) {
            (ClockSourceKind::Internal, true) => Some(self.next_fire()),
            (ClockSourceKind::External, true) if self.estimator.bpm().is_some() => {
                self.last_pulse.map(|last| last + SYNC_TIMEOUT)
            }
            _ => None,
        }
    }

    /// Advances the internal generator to `now`.
    ///
    /// Returns as soon as a step is completed, so it should be called again until it returns `None`. Externally,
    /// this only watches for a clock that has gone quiet.
    pub fn poll(&mut self, now: Instant) -> Option<StepDue> {
        match self.kind {
            ClockSourceKind::Internal => {
                while self.running && now >= self.next_fire() {
                    let due = self.next_fire();
                    self.since_anchor += 1;
                    if let Some(step) = self.advance(due) {
                        return Some(step);
                    }
                }
            }
            ClockSourceKind::External => {
                let quiet = self
                    .last_pulse
                    .is_some_and(|last| now >= last + SYNC_TIMEOUT);
                if quiet && self.estimator.bpm().is_some() {
                    info!("External clock went quiet; tempo unsynced");
                    self.estimator.reset();
                }
            }
        }
        None
    }

    /// Consumes transport and timing clock messages. Ignored unless the external source is selected.
    pub fn handle(&mut self, event: Event, now: Instant) -> Option<StepDue> {
        if self.kind != ClockSourceKind::External {
            return None;
        }
        match event {
            Event::Start => {
                info!("MIDI Clock: start");
                self.start(now);
                None
            }
            Event::Continue => {
                info!("MIDI Clock: continue");
                self.running = true;
                // the silence since stopping is not an interval between pulses
                self.last_pulse = None;
                None
            }
            Event::Stop => {
                info!("MIDI Clock: stop");
                self.stop();
                None
            }
            Event::Clock => self.external_pulse(now),
            _ => None,
        }
    }

    fn external_pulse(&mut self, now: Instant) -> Option<StepDue> {
        if !self.running {
            return None;
        }
        let interval = self
            .last_pulse
            .and_then(|last| now.checked_duration_since(last));
        if let Some(interval) = interval {
            if self.estimator.record(interval) {
                self.discontinuities = self.discontinuities.wrapping_add(1);
                info!("Tempo change detected; interval history cleared");
            }
        }
        self.last_pulse = Some(now);
        self.advance(now)
    }

    /// Counts a pulse, reporting a step if it completes one.
    fn advance(&mut self, timestamp: Instant) -> Option<StepDue> {
        self.pulse_index += 1;
        self.pair_pulse = (self.pair_pulse + 1) % self.pair_len();
        if self.pair_pulse != 0 && self.pair_pulse != self.split() {
            return None;
        }
        self.step_index = self.step_index.wrapping_add(1);
        Some(StepDue {
            step: self.step_index,
            tick: Tick {
                index: self.pulse_index,
                source: self.kind,
                timestamp,
            },
        })
    }

    /// Pulses per (unswung) step.
    fn step_pulses(&self) -> u32 {
        let division = u32::from(self.tempo.division());
        match self.kind {
            ClockSourceKind::Internal => division,
            ClockSourceKind::External => {
                // an external clock cannot be sped up, only counted differently
                let (multiplier, divider) = self.tempo_rate();
                (division * divider / multiplier).max(1)
            }
        }
    }

    fn tempo_rate(&self) -> (u32, u32) {
        let (multiplier, divider) = self.tempo.rate().factor();
        (u32::from(multiplier), u32::from(divider))
    }

    fn pair_len(&self) -> u32 {
        2 * self.step_pulses()
    }

    /// Pulse within the pair at which the second step begins.
    fn split(&self) -> u32 {
        let step = self.step_pulses();
        match self.kind {
            // internal swing stretches time instead of moving the boundary
            ClockSourceKind::Internal => step,
            ClockSourceKind::External => {
                let swing = u32::from(self.tempo.swing()) - 50;
                step + ((2 * swing * step + 50) / 100).min(step - 1)
            }
        }
    }

    fn last_fire(&self) -> Instant {
        self.anchor + self.tempo.offset(self.anchor_phase, self.since_anchor)
    }

    fn next_fire(&self) -> Instant {
        self.anchor + self.tempo.offset(self.anchor_phase, self.since_anchor + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ClockRate;
    use std::vec::Vec;

    fn internal(bpm: u16, swing: u8) -> ClockSource {
        let config = Config {
            bpm,
            swing,
            ..Config::default()
        };
        ClockSource::new(&config, Instant::from_ticks(0))
    }

    fn external(swing: u8) -> ClockSource {
        let config = Config {
            clock_source: ClockSourceKind::External,
            swing,
            ..Config::default()
        };
        ClockSource::new(&config, Instant::from_ticks(0))
    }

    /// Polls like a scheduler that always wakes a little late, collecting step timestamps.
    fn run_internal(clock: &mut ClockSource, steps: usize) -> Vec<Instant> {
        let mut timestamps = Vec::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        while timestamps.len() < steps {
            let Some(deadline) = clock.next_deadline() else {
                break;
            };
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let lateness = Duration::from_micros((seed >> 33) % 900);
            while let Some(step) = clock.poll(deadline + lateness) {
                timestamps.push(step.tick.timestamp);
            }
        }
        timestamps
    }

    fn micros_between(earlier: Instant, later: Instant) -> i64 {
        later.as_micros() as i64 - earlier.as_micros() as i64
    }

    mod internal {
        use super::*;

        #[test]
        fn runs_on_creation() {
            let clock = internal(120, 50);
            assert!(clock.is_running());
            assert_eq!(Some(120), clock.bpm(), "Expected left but got right");
        }

        #[test]
        fn nothing_is_due_early() {
            let mut clock = internal(120, 50);
            // a sixteenth at 120 BPM is 125 ms
            assert_eq!(None, clock.poll(Instant::from_millis(124)), "Expected left but got right");
            assert_eq!(0, clock.step_index(), "Expected left but got right");
            let step = clock.poll(Instant::from_millis(125));
            assert_eq!(Some(1), step.map(|s| s.step), "Expected left but got right");
        }

        #[test]
        fn late_polls_do_not_accumulate_drift() {
            let mut clock = internal(120, 50);
            let timestamps = run_internal(&mut clock, 10_000);
            let start = Instant::from_ticks(0);
            // 6 pulses of 60 / (120 * 24) s each: 125 ms per step
            for (n, &timestamp) in timestamps.iter().enumerate() {
                let expected = 125_000 * (n as i64 + 1);
                let error = micros_between(start, timestamp) - expected;
                assert!(
                    (-1..=1).contains(&error),
                    "step {} was {} us off schedule",
                    n + 1,
                    error
                );
            }
        }

        #[test]
        fn catching_up_yields_one_step_per_poll() {
            let mut clock = internal(120, 50);
            let late = Instant::from_millis(1_000);
            let mut steps = 0;
            while clock.poll(late).is_some() {
                steps += 1;
            }
            assert_eq!(8, steps, "Expected left but got right");
        }

        #[test]
        fn swing_alternates_step_lengths() {
            let mut clock = internal(125, 75);
            let timestamps = run_internal(&mut clock, 4);
            let start = Instant::from_ticks(0);
            // 20 ms pulses, 6 per step: 120 ms straight, 180 ms / 60 ms at 75% swing
            let offsets: Vec<i64> = timestamps
                .iter()
                .map(|&t| micros_between(start, t))
                .collect();
            assert_eq!(
                std::vec![180_000, 240_000, 420_000, 480_000],
                offsets,
                "Expected left but got right"
            );
        }

        #[test]
        fn tempo_change_keeps_phase() {
            let mut clock = internal(125, 50);
            // first pulse at 20 ms
            assert_eq!(None, clock.poll(Instant::from_millis(20)), "Expected left but got right");
            clock.reconfigure(
                &Config {
                    bpm: 125,
                    rate: ClockRate::Mul2,
                    ..Config::default()
                },
                Instant::from_millis(25),
            );
            // the remaining five pulses of the step now last 10 ms each
            assert_eq!(
                Some(Instant::from_millis(30)),
                clock.next_deadline(),
                "Expected left but got right"
            );
            let step = clock.poll(Instant::from_millis(70));
            assert_eq!(
                Some(Instant::from_millis(70)),
                step.map(|s| s.tick.timestamp),
                "Expected left but got right"
            );
        }

        #[test]
        fn transport_is_ignored() {
            let mut clock = internal(120, 50);
            assert_eq!(None, clock.handle(Event::Stop, Instant::from_ticks(0)), "Expected left but got right");
            assert!(clock.is_running());
        }
    }

    mod external {
        use super::*;

        const PULSE: u64 = 20_830;

        fn pulse(clock: &mut ClockSource, n: u64) -> Option<StepDue> {
            clock.handle(Event::Clock, Instant::from_micros(n * PULSE))
        }

        #[test]
        fn silent_until_started() {
            let mut clock = external(50);
            assert!(!clock.is_running());
            assert_eq!(None, clock.next_deadline(), "Expected left but got right");
            for n in 1..=24 {
                assert_eq!(None, pulse(&mut clock, n), "Expected left but got right");
            }
            assert_eq!(None, clock.bpm(), "Expected left but got right");
        }

        #[test]
        fn steps_every_six_pulses() {
            let mut clock = external(50);
            clock.handle(Event::Start, Instant::from_ticks(0));
            let steps: Vec<u64> = (1..=24)
                .filter_map(|n| pulse(&mut clock, n).map(|step| step.tick.index))
                .collect();
            assert_eq!(std::vec![6, 12, 18, 24], steps, "Expected left but got right");
        }

        #[test]
        fn estimates_tempo() {
            let mut clock = external(50);
            clock.handle(Event::Start, Instant::from_ticks(0));
            for n in 0..=96 {
                pulse(&mut clock, n);
            }
            assert_eq!(Some(120), clock.bpm(), "Expected left but got right");
        }

        #[test]
        fn swing_moves_the_second_step() {
            let mut clock = external(75);
            clock.handle(Event::Start, Instant::from_ticks(0));
            let steps: Vec<u64> = (1..=24)
                .filter_map(|n| pulse(&mut clock, n).map(|step| step.tick.index))
                .collect();
            // 75% swing shifts the boundary by half a step: 9 pulses then 3
            assert_eq!(std::vec![9, 12, 21, 24], steps, "Expected left but got right");
        }

        #[test]
        fn rate_changes_pulses_per_step() {
            let config = Config {
                clock_source: ClockSourceKind::External,
                rate: ClockRate::Mul2,
                ..Config::default()
            };
            let mut clock = ClockSource::new(&config, Instant::from_ticks(0));
            clock.handle(Event::Start, Instant::from_ticks(0));
            let steps = (1..=12).filter(|&n| pulse(&mut clock, n).is_some()).count();
            assert_eq!(4, steps, "Expected left but got right");
        }

        #[test]
        fn stop_and_continue() {
            let mut clock = external(50);
            clock.handle(Event::Start, Instant::from_ticks(0));
            for n in 1..=4 {
                pulse(&mut clock, n);
            }
            clock.handle(Event::Stop, Instant::from_micros(5 * PULSE));
            assert!(!clock.is_running());
            assert_eq!(None, pulse(&mut clock, 6), "Expected left but got right");

            clock.handle(Event::Continue, Instant::from_micros(7 * PULSE));
            // stop rewinds the pulse counter, so a full step is needed after continuing
            let first = (8..=20).find(|&n| pulse(&mut clock, n).is_some());
            assert_eq!(Some(13), first, "Expected left but got right");
        }

        #[test]
        fn quiet_clock_becomes_unsynced() {
            let mut clock = external(50);
            clock.handle(Event::Start, Instant::from_ticks(0));
            for n in 0..=24 {
                pulse(&mut clock, n);
            }
            assert!(clock.bpm().is_some());
            let last = Instant::from_micros(24 * PULSE);
            assert_eq!(
                Some(last + SYNC_TIMEOUT),
                clock.next_deadline(),
                "Expected left but got right"
            );
            clock.poll(last + SYNC_TIMEOUT);
            assert_eq!(None, clock.bpm(), "Expected left but got right");
        }
    }

    #[test]
    fn switching_source_starts_over() {
        let mut clock = internal(120, 50);
        clock.poll(Instant::from_millis(500));
        clock.reconfigure(
            &Config {
                clock_source: ClockSourceKind::External,
                ..Config::default()
            },
            Instant::from_millis(510),
        );
        assert!(!clock.is_running());
        assert_eq!(0, clock.step_index(), "Expected left but got right");
        assert_eq!(None, clock.bpm(), "Expected left but got right");
    }
}
