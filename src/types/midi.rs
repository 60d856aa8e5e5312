// Copyright (c) 2024 Mike Tsao

//! Raw MIDI wire values: channels, status bytes, and 7-bit data values.

use serde::{Deserialize, Serialize};
use synonym::Synonym;

pub use midly::num::u7;

/// Newtype for a MIDI channel, 0-15.
#[derive(Synonym, Serialize, Deserialize)]
pub struct MidiChannel(pub u8);
#[allow(missing_docs)]
impl MidiChannel {
    pub const MIN_VALUE: u8 = 0;
    pub const MAX_VALUE: u8 = 15;
    pub const DRUM_VALUE: u8 = 10;
    pub const DRUM: Self = Self(Self::DRUM_VALUE);

    pub const fn new(value: u8) -> Self {
        Self(value & 0x0f)
    }
}

/// Status-byte constants for the MIDI messages this engine understands. The
/// low nibble (channel) is ORed in at emission time.
pub mod status {
    /// Note-on.
    pub const NOTE_ON: u8 = 0x90;
    /// Note-off.
    pub const NOTE_OFF: u8 = 0x80;
    /// Continuous controller.
    pub const CONTROL_CHANGE: u8 = 0xB0;
    /// Pitch bend.
    pub const PITCH_BEND: u8 = 0xE0;
    /// Program change.
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    /// MIDI real-time clock tick, 24 per quarter note.
    pub const CLOCK_TICK: u8 = 0xF8;
    /// MIDI real-time clock start.
    pub const CLOCK_START: u8 = 0xFA;
    /// MIDI real-time clock stop.
    pub const CLOCK_STOP: u8 = 0xFC;
}

/// Clamps an arbitrary byte into the 7-bit range MIDI data bytes require.
pub fn to_u7(value: u8) -> u7 {
    u7::from(value.min(127))
}
