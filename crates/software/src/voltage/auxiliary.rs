use crate::configuration::{AuxSource, Config};
use wmidi::{U7, U14};

/// The auxiliary CV channel: one MIDI source mapped linearly onto the output range and smoothed.
///
/// Smoothing is a single-pole filter applied once per incoming value, so a jump in the source reaches the output
/// over a few messages rather than at once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AuxChannel {
    source: AuxSource,
    control: U7,
    alpha: f32,
    ceiling: f32,
    learning: bool,
    learned: Option<U7>,
    smoothed: f32,
}

impl AuxChannel {
    /// Constructs a channel whose full scale is `ceiling` volts. The output starts at 0 V.
    pub fn new(config: &Config, ceiling: f32) -> Self {
        Self {
            source: config.aux_source,
            control: config.aux_control,
            alpha: config.aux_smoothing.alpha(),
            ceiling,
            learning: false,
            learned: None,
            smoothed: 0.0,
        }
    }

    /// Picks up changed settings. A learned controller survives unless the configured source or controller changed.
    pub fn reconfigure(&mut self, config: &Config) {
        if config.aux_source != self.source || config.aux_control != self.control {
            self.learned = None;
        }
        self.source = config.aux_source;
        self.control = config.aux_control;
        self.alpha = config.aux_smoothing.alpha();
    }

    /// Listens for the next control change and follows its controller from then on.
    pub fn learn(&mut self) {
        info!("Aux CV: learning");
        self.learning = true;
    }

    /// Whether [`learn`][Self::learn] is waiting for a control change.
    pub fn is_learning(&self) -> bool {
        self.learning
    }

    /// Controller captured by [`learn`][Self::learn], if any.
    pub fn learned(&self) -> Option<U7> {
        self.learned
    }

    /// Source in effect, taking a learned controller into account.
    pub fn source(&self) -> AuxSource {
        match self.learned {
            Some(_) => AuxSource::ControlChange,
            None => self.source,
        }
    }

    fn control(&self) -> U7 {
        self.learned.unwrap_or(self.control)
    }

    /// Current output in volts.
    pub fn output(&self) -> f32 {
        self.smoothed
    }

    /// Feeds a control change. Returns the new output if the channel follows this controller.
    pub fn control_change(&mut self, control: U7, value: U7) -> Option<f32> {
        if self.learning {
            self.learning = false;
            self.learned = Some(control);
            info!("Aux CV: learned CC {}", u8::from(control));
        }
        (self.source() == AuxSource::ControlChange && self.control() == control)
            .then(|| self.update(fraction7(value)))
    }

    /// Feeds channel pressure. Returns the new output if the channel follows pressure.
    pub fn channel_pressure(&mut self, value: U7) -> Option<f32> {
        (self.source() == AuxSource::ChannelPressure).then(|| self.update(fraction7(value)))
    }

    /// Feeds pitch bend. Returns the new output if the channel follows pitch bend.
    pub fn pitch_bend(&mut self, value: U14) -> Option<f32> {
        (self.source() == AuxSource::PitchBend)
            .then(|| self.update(f32::from(u16::from(value)) / 16383.0))
    }

    /// Feeds a note-on velocity. Returns the new output if the channel follows velocity.
    pub fn velocity(&mut self, value: U7) -> Option<f32> {
        (self.source() == AuxSource::Velocity).then(|| self.update(fraction7(value)))
    }

    fn update(&mut self, fraction: f32) -> f32 {
        let target = fraction * self.ceiling;
        self.smoothed = self.alpha * target + (1.0 - self.alpha) * self.smoothed;
        self.smoothed
    }
}

fn fraction7(value: U7) -> f32 {
    f32::from(u8::from(value)) / 127.0
}
