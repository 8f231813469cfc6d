use crate::configuration::{ArpPattern, ClockSourceKind};
use wmidi::{Note, U7};

/// Classes of trouble the device recovers from on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// CV hardware did not answer at start-up; voltage outputs are disabled for the session.
    HardwareAbsent,
    /// A configuration value was out of range and has been clamped.
    InvalidConfiguration,
    /// A MIDI or CV write failed and was skipped.
    TransientIo,
    /// The external clock changed tempo abruptly; its tempo estimate started over.
    TempoDiscontinuity,
}

/// A snapshot of the device for displays and logs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Status {
    /// Tempo in BPM, or `None` while an external clock has not been measured yet.
    pub bpm: Option<u16>,
    /// Whether the clock is producing steps.
    pub running: bool,
    /// Where steps come from.
    pub clock_source: ClockSourceKind,
    /// Arpeggiator pattern.
    pub pattern: ArpPattern,
    /// Notes held by the arpeggiator.
    pub held: usize,
    /// Position of the next step.
    pub step_index: usize,
    /// Note currently sounding from the arpeggiator.
    pub sounding: Option<Note>,
    /// Auxiliary CV output in volts.
    pub aux_volts: f32,
    /// Controller captured by aux learn mode.
    pub learned_control: Option<U7>,
    /// Whether CV hardware is attached.
    pub cv_present: bool,
    /// MIDI messages which could not be sent.
    pub dropped_midi: u32,
    /// CV writes which failed.
    pub dropped_cv: u32,
    /// The most recent fault.
    pub fault: Option<Fault>,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Status {{ bpm: {}, running: {}, clock: {}, pattern: {}, held: {}, step: {}, sounding: {}, aux: {}V, learned: {}, cv: {}, dropped: {}/{}, fault: {} }}",
            self.bpm,
            self.running,
            self.clock_source,
            self.pattern.name(),
            self.held,
            self.step_index,
            self.sounding.map(|note| note.to_str()),
            self.aux_volts,
            self.learned_control.map(u8::from),
            self.cv_present,
            self.dropped_midi,
            self.dropped_cv,
            self.fault
        );
    }
}
