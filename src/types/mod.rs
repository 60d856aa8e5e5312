// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the engine.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        midi::{status, to_u7, MidiChannel, u7},
        time::{BeatTime, SampleRate, SequencerSettings, Tempo, MIDI_CLOCK_PPQN, PPQ},
    };
}

pub mod midi;
pub mod time;
