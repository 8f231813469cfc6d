//! The seams between the signal path and hardware: a MIDI sink, a voltage sink, and helpers shared by their
//! implementations.
//!
//! Every write is fallible but none is fatal. A failed write is logged, counted and skipped so a malfunctioning
//! peripheral can never stall sequencing.

mod mcp4728;
pub use mcp4728::*;

use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7};

/// Anything that can transmit MIDI, e.g. a USB endpoint queue or a UART.
pub trait MidiSink {
    /// Error reported when a message could not be sent.
    type Error;

    /// Sends a single message. Must return promptly; a full buffer is an error, not a reason to wait.
    fn send(&mut self, message: MidiMessage<'static>) -> Result<(), Self::Error>;
}

/// Analog outputs of the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvChannel {
    /// Pitch CV.
    Pitch,
    /// Gate (or trigger).
    Gate,
    /// Auxiliary CV following a selectable MIDI source.
    Aux,
}

/// Anything that can produce control voltages and gate levels.
pub trait VoltageSink {
    /// Error reported when a write failed.
    type Error;

    /// Full-scale output voltage.
    fn reference(&self) -> f32;

    /// Drives `channel` to `volts`, quantized to whatever resolution the hardware has.
    fn set_voltage(&mut self, channel: CvChannel, volts: f32) -> Result<(), Self::Error>;

    /// Drives `channel` to a logic level; `high` is the physical level, not whether a note sounds.
    fn set_gate(&mut self, channel: CvChannel, high: bool) -> Result<(), Self::Error>;
}

/// Converts a voltage into the code a DAC of the given resolution needs to produce it.
///
/// Voltages outside `0..=reference` saturate at the ends of the range.
pub fn dac_code(volts: f32, reference: f32, bits: u8) -> u16 {
    let full_scale = (1_u32 << bits) - 1;
    if reference <= 0.0 {
        return 0;
    }
    let ratio = (volts / reference).clamp(0.0, 1.0);
    // casting truncates; at 12 bits a step is barely over a millivolt, which is well below what anyone can hear
    (ratio * full_scale as f32) as u16
}

/// Wraps a [`MidiSink`], turning failed sends into a log line and a counter.
pub struct MidiOut<M> {
    sink: M,
    failures: u32,
}

impl<M: MidiSink> MidiOut<M> {
    /// Wraps `sink`.
    pub fn new(sink: M) -> Self {
        Self { sink, failures: 0 }
    }

    /// Number of messages that could not be delivered.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Borrows the wrapped sink.
    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Sends a note-on.
    pub fn note_on(&mut self, channel: Channel, note: Note, velocity: U7) {
        self.send(MidiMessage::NoteOn(channel, note, velocity));
    }

    /// Sends a note-off with zero release velocity.
    pub fn note_off(&mut self, channel: Channel, note: Note) {
        self.send(MidiMessage::NoteOff(channel, note, U7::from_u8_lossy(0)));
    }

    /// Sends a control change.
    pub fn control_change(&mut self, channel: Channel, control: U7, value: U7) {
        self.send(MidiMessage::ControlChange(
            channel,
            ControlFunction(control),
            value,
        ));
    }

    fn send(&mut self, message: MidiMessage<'static>) {
        if self.sink.send(message).is_err() {
            self.failures = self.failures.wrapping_add(1);
            warn!("MIDI output dropped a message");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    mod dac_code {
        use super::*;

        #[test]
        fn full_scale() {
            assert_eq!(4095, dac_code(5.0, 5.0, 12), "Expected left but got right");
        }

        #[test]
        fn one_volt() {
            assert_eq!(819, dac_code(1.0, 5.0, 12), "Expected left but got right");
        }

        #[test]
        fn saturates() {
            assert_eq!(0, dac_code(-1.0, 5.0, 12), "Expected left but got right");
            assert_eq!(4095, dac_code(7.5, 5.0, 12), "Expected left but got right");
        }
    }

    #[test]
    fn failed_sends_are_counted_not_propagated() {
        let mut out = MidiOut::new(RecordingMidi {
            fail: true,
            ..Default::default()
        });
        out.note_on(Channel::Ch1, Note::C4, U7::from_u8_lossy(100));
        out.note_off(Channel::Ch1, Note::C4);
        assert_eq!(2, out.failures(), "Expected left but got right");
        assert!(out.sink().sent.is_empty());
    }

    #[test]
    fn note_off_has_zero_velocity() {
        let mut out = MidiOut::new(RecordingMidi::default());
        out.note_off(Channel::Ch2, Note::D4);
        assert_eq!(
            std::vec![MidiMessage::NoteOff(
                Channel::Ch2,
                Note::D4,
                U7::from_u8_lossy(0)
            )],
            out.sink().sent,
            "Expected left but got right"
        );
    }
}
