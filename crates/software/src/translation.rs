//! The fixed-order note translation pipeline: scale quantization, then arpeggiation.
//!
//! Quantization is a correction, so it always runs first; the arpeggiator only ever sees in-scale pitches. Stages
//! that configuration disables are simply left out of the active list, which behaves as identity.

mod quantizer;
pub use quantizer::*;

use crate::configuration::Config;
use enum_dispatch::enum_dispatch;
use tinyvec::ArrayVec;
use wmidi::{Note, U7};

/// A single stage of the [`Pipeline`].
#[enum_dispatch]
pub trait Layer {
    /// Transforms a pitch on its way through the pipeline.
    fn transform(&self, note: Note, velocity: U7) -> Note;

    /// Short label for logs and status displays.
    fn name(&self) -> &'static str;
}

/// Snaps pitches to a scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleQuantizeLayer {
    quantizer: ScaleQuantizer,
}

impl Layer for ScaleQuantizeLayer {
    fn transform(&self, note: Note, _velocity: U7) -> Note {
        self.quantizer.quantize(note)
    }

    fn name(&self) -> &'static str {
        "quantize"
    }
}

/// Marks that notes are buffered by the arpeggiator rather than passed straight through.
///
/// Pitches are not changed here; the arpeggiator consumes them on its own clock.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ArpeggiateLayer;

impl Layer for ArpeggiateLayer {
    fn transform(&self, note: Note, _velocity: U7) -> Note {
        note
    }

    fn name(&self) -> &'static str {
        "arpeggiate"
    }
}

/// Any stage the [`Pipeline`] can hold.
#[enum_dispatch(Layer)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stage {
    /// See [`ScaleQuantizeLayer`].
    ScaleQuantize(ScaleQuantizeLayer),
    /// See [`ArpeggiateLayer`].
    Arpeggiate(ArpeggiateLayer),
}

// required by `ArrayVec`; never observable since only pushed stages are iterated
impl Default for Stage {
    fn default() -> Self {
        Stage::Arpeggiate(ArpeggiateLayer)
    }
}

/// The active stages, in the order they apply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pipeline {
    stages: ArrayVec<[Stage; 2]>,
    quantizer: ScaleQuantizer,
}

impl Pipeline {
    /// Builds a pipeline for the given configuration.
    pub fn new(config: &Config) -> Self {
        let mut pipeline = Self {
            stages: ArrayVec::new(),
            quantizer: ScaleQuantizer::chromatic(),
        };
        pipeline.reconfigure(config);
        pipeline
    }

    /// Rebuilds the active stage list. Holds no timing state, so the clock is unaffected.
    pub fn reconfigure(&mut self, config: &Config) {
        let config = config.sanitized();
        self.quantizer = ScaleQuantizer::new(config.scale, config.root);
        self.stages.clear();
        if config.quantizes() {
            self.stages.push(Stage::ScaleQuantize(ScaleQuantizeLayer {
                quantizer: self.quantizer,
            }));
        }
        if config.arpeggiates() {
            self.stages.push(Stage::Arpeggiate(ArpeggiateLayer));
        }
        debug!("Pipeline rebuilt with {} active stage(s)", self.stages.len());
    }

    /// Runs a note through every active stage in order.
    pub fn process(&self, note: Note, velocity: U7) -> Note {
        self.stages
            .iter()
            .fold(note, |note, stage| stage.transform(note, velocity))
    }

    /// The quantize rule alone; identity when quantization is disabled.
    pub fn quantizer(&self) -> ScaleQuantizer {
        self.quantizer
    }

    /// Whether notes should be buffered by the arpeggiator.
    pub fn arpeggiates(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| matches!(stage, Stage::Arpeggiate(_)))
    }

    /// Labels of the active stages, in order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }
}
