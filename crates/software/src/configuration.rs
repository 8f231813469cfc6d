//! This module contains both user-configurable settings (implemented as enums) and traits to make them easier to work with in code.
//!
//! The core never mutates a [`Config`]: components copy what they need at construction and whenever they are
//! reconfigured, so whoever owns the configuration (menus, persisted storage, push-buttons) stays in charge of it.

mod auxiliary;
pub use auxiliary::*;

mod clock;
pub use clock::*;

mod cv;
pub use cv::*;

mod note_priority;
pub use note_priority::*;

mod pattern;
pub use pattern::*;

mod scale;
pub use scale::*;

mod velocity;
pub use velocity::*;

use num_traits::{FromPrimitive, ToPrimitive};
use wmidi::{Channel, U7};

/// A trait which allows infinite cycling of an enum's variants.
///
/// Useful for pushbutton user interfaces, allowing presses to advance from the current to the next variant,
/// cycling back to the beginning when all variants have been exhausted.
pub trait CycleConfig {
    /// Return the next variant, cycling back to the beginning as needed.
    fn cycle(self) -> Self
    where
        Self: FromPrimitive + ToPrimitive + Sized + Copy,
    {
        let Some(index) = self.to_u8() else {
            return self;
        };
        <Self as FromPrimitive>::from_u8(index + 1)
            .or_else(|| FromPrimitive::from_u8(0))
            .unwrap_or(self)
    }
}

/// Slowest tempo the internal clock will run at.
pub const MIN_BPM: u16 = 30;
/// Fastest tempo the internal clock will run at.
pub const MAX_BPM: u16 = 300;
/// Largest number of octaves a held chord is spread across.
pub const MAX_OCTAVE_RANGE: u8 = 4;
/// MIDI clock pulses per sixteenth note.
pub const DEFAULT_DIVISION: u8 = 6;
/// Largest accepted division: one step per whole note at 24 PPQN.
pub const MAX_DIVISION: u8 = 96;

/// Everything the signal path needs to know about how the performer has set the device up.
///
/// Values outside their documented ranges are not rejected; [`Config::sanitized`] clamps them, and every
/// component runs the configuration through it before reading anything.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Scale incoming pitches are snapped to. [`Scale::Chromatic`] disables quantization.
    pub scale: Scale,
    /// Root of the scale as a pitch class (0 = C, 11 = B).
    pub root: u8,
    /// Order in which held notes are played back.
    pub pattern: ArpPattern,
    /// Number of octaves the held chord is spread across; 0 bypasses the arpeggiator.
    pub octave_range: u8,
    /// Where steps come from.
    pub clock_source: ClockSourceKind,
    /// Tempo of the internal clock.
    pub bpm: u16,
    /// Multiplier or divider applied to the base clock interval.
    pub rate: ClockRate,
    /// Percentage of a two-step pair given to its first step, 50 (straight) to 100.
    pub swing: u8,
    /// Clock pulses per step (24 PPQN; 6 is a sixteenth note).
    pub division: u8,
    /// Channel to listen and transmit on; `None` listens to every channel and transmits on channel 1.
    pub channel: Option<Channel>,
    /// Whether arpeggiated notes keep the velocity they were played with.
    pub velocity: VelocityMode,
    /// Velocity used when [`VelocityMode::Fixed`] is selected.
    pub fixed_velocity: U7,
    /// Keeps notes in the arpeggiator after their keys are released.
    pub latch: bool,
    /// Pitch CV slope.
    pub cv_profile: CvProfile,
    /// Electrical convention of the gate output.
    pub trigger: TriggerPolarity,
    /// Which held note drives the pitch CV when the arpeggiator is bypassed.
    pub note_priority: NotePriority,
    /// Source of the auxiliary CV output.
    pub aux_source: AuxSource,
    /// Controller number monitored when [`AuxSource::ControlChange`] is selected.
    pub aux_control: U7,
    /// Amount of smoothing applied to the auxiliary CV output.
    pub aux_smoothing: Smoothing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: Scale::Chromatic,
            root: 0,
            pattern: ArpPattern::Up,
            octave_range: 1,
            clock_source: ClockSourceKind::Internal,
            bpm: 120,
            rate: ClockRate::Normal,
            swing: 50,
            division: DEFAULT_DIVISION,
            channel: None,
            velocity: VelocityMode::Passthrough,
            fixed_velocity: U7::from_u8_lossy(100),
            latch: false,
            cv_profile: CvProfile::Standard,
            trigger: TriggerPolarity::VTrig,
            note_priority: NotePriority::Last,
            aux_source: AuxSource::Disabled,
            // brightness, a.k.a. filter cutoff
            aux_control: U7::from_u8_lossy(74),
            aux_smoothing: Smoothing::Low,
        }
    }
}

impl Config {
    /// Returns a copy of the configuration with every numeric setting clamped into its valid range.
    pub fn sanitized(&self) -> Self {
        let clamped = Self {
            root: self.root % 12,
            octave_range: self.octave_range.min(MAX_OCTAVE_RANGE),
            bpm: self.bpm.clamp(MIN_BPM, MAX_BPM),
            swing: self.swing.clamp(50, 100),
            division: self.division.clamp(1, MAX_DIVISION),
            fixed_velocity: U7::from_u8_lossy(u8::from(self.fixed_velocity).max(1)),
            ..*self
        };
        if clamped != *self {
            warn!("Out-of-range configuration values were clamped");
        }
        clamped
    }

    /// Whether the quantize stage of the translation pipeline is active.
    pub fn quantizes(&self) -> bool {
        self.scale != Scale::Chromatic
    }

    /// Whether the arpeggiate stage of the translation pipeline is active.
    pub fn arpeggiates(&self) -> bool {
        self.octave_range > 0
    }

    /// Channel outgoing MIDI is sent on.
    pub fn output_channel(&self) -> Channel {
        self.channel.unwrap_or(Channel::Ch1)
    }

    /// Determines whether a channel voice message on `channel` should be acted upon.
    pub fn accepts(&self, channel: Channel) -> bool {
        self.channel.is_none_or(|configured| configured == channel)
    }
}
