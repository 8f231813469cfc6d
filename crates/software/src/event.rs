//! Inbound MIDI events the signal path reacts to, and the USB-MIDI event packet framing they arrive in.

use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7, U14};

/// A MIDI message the device acts upon.
///
/// Unlike [`MidiMessage`], an `Event` owns its payload and is `Copy`, so it can be queued between tasks. A note-on
/// with zero velocity is normalized into a [`Event::NoteOff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A key was pressed.
    NoteOn {
        /// Channel the message arrived on.
        channel: Channel,
        /// Pitch of the key.
        note: Note,
        /// Strike velocity, never zero.
        velocity: U7,
    },
    /// A key was released.
    NoteOff {
        /// Channel the message arrived on.
        channel: Channel,
        /// Pitch of the key.
        note: Note,
    },
    /// A controller moved.
    ControlChange {
        /// Channel the message arrived on.
        channel: Channel,
        /// Controller number.
        control: U7,
        /// Controller position.
        value: U7,
    },
    /// Channel-wide aftertouch.
    ChannelPressure {
        /// Channel the message arrived on.
        channel: Channel,
        /// Pressure amount.
        value: U7,
    },
    /// Pitch wheel moved; 8192 is centered.
    PitchBend {
        /// Channel the message arrived on.
        channel: Channel,
        /// Wheel position.
        value: U14,
    },
    /// Transport start: play from the top.
    Start,
    /// Transport stop.
    Stop,
    /// Transport continue: resume from where playback stopped.
    Continue,
    /// One MIDI timing clock pulse (24 per quarter note).
    Clock,
}

impl Event {
    /// Converts a parsed [`MidiMessage`], returning `None` for kinds the device ignores.
    pub fn from_midi(message: &MidiMessage<'_>) -> Option<Self> {
        let event = match *message {
            MidiMessage::NoteOn(channel, note, velocity) if u8::from(velocity) == 0 => {
                Event::NoteOff { channel, note }
            }
            MidiMessage::NoteOn(channel, note, velocity) => Event::NoteOn {
                channel,
                note,
                velocity,
            },
            MidiMessage::NoteOff(channel, note, _) => Event::NoteOff { channel, note },
            MidiMessage::ControlChange(channel, ControlFunction(control), value) => {
                Event::ControlChange {
                    channel,
                    control,
                    value,
                }
            }
            MidiMessage::ChannelPressure(channel, value) => {
                Event::ChannelPressure { channel, value }
            }
            MidiMessage::PitchBendChange(channel, value) => Event::PitchBend { channel, value },
            MidiMessage::Start => Event::Start,
            MidiMessage::Stop => Event::Stop,
            MidiMessage::Continue => Event::Continue,
            MidiMessage::TimingClock => Event::Clock,
            _ => return None,
        };
        Some(event)
    }

    /// Channel of a channel voice message; `None` for transport and clock.
    pub fn channel(&self) -> Option<Channel> {
        match *self {
            Event::NoteOn { channel, .. }
            | Event::NoteOff { channel, .. }
            | Event::ControlChange { channel, .. }
            | Event::ChannelPressure { channel, .. }
            | Event::PitchBend { channel, .. } => Some(channel),
            Event::Start | Event::Stop | Event::Continue | Event::Clock => None,
        }
    }
}

/// Number of MIDI bytes carried by a USB-MIDI event packet, derived from its Code Index Number.
fn payload_len(header: u8) -> Option<usize> {
    match header & 0x0F {
        0x5 | 0xF => Some(1),
        0x2 | 0x6 | 0xC | 0xD => Some(2),
        0x3 | 0x4 | 0x7 | 0x8 | 0x9 | 0xA | 0xB | 0xE => Some(3),
        // reserved for future expansion
        _ => None,
    }
}

/// Extracts the recognized [`Event`]s from a buffer holding one or more USB-MIDI event packets.
pub fn events(data: &[u8]) -> impl Iterator<Item = Event> + '_ {
    data.chunks(4).filter_map(|potential_packet| {
        if potential_packet.len() != 4 {
            error!("USB-MIDI Event Packets must always be 32 bits long");
            return None;
        }
        let len = payload_len(potential_packet[0])?;
        // the zeroth byte is the packet header (cable number and Code Index Number); the MIDI event follows it
        match MidiMessage::from_bytes(&potential_packet[1..=len]) {
            Ok(message) => Event::from_midi(&message),
            Err(_) => {
                debug!("Discarding unparsable USB-MIDI packet {}", potential_packet);
                None
            }
        }
    })
}

/// Frames an outgoing [`MidiMessage`] as a USB-MIDI event packet on virtual cable 0.
///
/// Only channel voice and single-byte system messages fit in one packet; anything else yields `None`.
pub fn packet(message: &MidiMessage<'_>) -> Option<[u8; 4]> {
    let mut packet = [0_u8; 4];
    let len = message.copy_to_slice(&mut packet[1..]).ok()?;
    let status = packet[1];
    packet[0] = match (status, len) {
        (0x80..=0xEF, _) => status >> 4,
        (0xF8..=0xFF, 1) => 0x0F,
        _ => return None,
    };
    Some(packet)
}
