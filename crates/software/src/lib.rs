//! This crate contains architecture-agnostic logic for Prisme, a MIDI arpeggiator which re-times and re-sequences
//! incoming notes and drives both a MIDI output and [CV/gate](https://en.wikipedia.org/wiki/CV/gate) outputs for
//! modular synthesizers.
//!
//! The signal path, leaves first:
//! - [`clock::ClockSource`] produces "step due" events from an internal generator or external MIDI clock;
//! - [`translation::Pipeline`] quantizes pitches to a scale before they reach the arpeggiator;
//! - [`arpeggiator::Arpeggiator`] turns held notes into a step sequence and plays one step per clock step;
//! - [`voltage::VoltageEngine`] resolves held notes into a single pitch/gate pair and hosts an auxiliary channel.
//!
//! [`hub::Hub`] ties them together and is what a scheduler loop drives.

#![deny(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod activated_notes;
pub mod arpeggiator;
pub mod clock;
pub mod configuration;
pub mod event;
pub mod hub;
pub mod output;
pub mod translation;
pub mod voltage;
