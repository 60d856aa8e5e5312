// Copyright (c) 2024 Mike Tsao

//! Beats, samples, and the subtick lattice that the scheduler walks.

use serde::{Deserialize, Serialize};
use synonym::Synonym;

/// Pulses (subticks) per quarter note. The scheduler's finest time unit: one
/// beat is divided into this many subticks, and every event's `beat_time` is
/// projected onto this lattice by rounding.
pub const PPQ: i64 = 96;

/// MIDI real-time clock runs at 24 pulses per quarter note, independent of
/// our finer subtick lattice.
pub const MIDI_CLOCK_PPQN: i64 = 24;

/// Beats per minute.
#[derive(Synonym, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Tempo(pub f64);
impl Default for Tempo {
    fn default() -> Self {
        Self(120.0)
    }
}
impl Tempo {
    /// Beats per second.
    pub fn bps(&self) -> f64 {
        self.0 / 60.0
    }

    /// Samples that correspond to one beat at the given [SampleRate].
    pub fn samples_per_beat(&self, sample_rate: SampleRate) -> f64 {
        sample_rate.0 as f64 * 60.0 / self.0
    }
}

/// Samples per second.
#[derive(Synonym, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SampleRate(pub f64);
impl Default for SampleRate {
    fn default() -> Self {
        Self(44100.0)
    }
}

/// A position expressed in beats (quarter notes), as supplied by the host's
/// tempo/phase source. Nonnegative, and continuous across buffer boundaries
/// (it is not wrapped to any sequence's length).
#[derive(Synonym, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, PartialOrd)]
#[serde(rename_all = "kebab-case")]
pub struct BeatTime(pub f64);
impl Default for BeatTime {
    fn default() -> Self {
        Self(0.0)
    }
}
impl BeatTime {
    /// Projects this beat position onto the subtick lattice, rounding to the
    /// nearest subtick.
    pub fn to_subtick(self) -> i64 {
        (self.0 * PPQ as f64).round() as i64
    }
}

/// Per-buffer parameters supplied by the audio host. Read-only from the
/// engine's point of view.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SequencerSettings {
    /// Current tempo.
    pub tempo: Tempo,
    /// Host sample rate.
    pub sample_rate: SampleRate,
    /// Number of samples in this buffer.
    pub frame_count: u32,
}
impl SequencerSettings {
    /// How many beats this buffer spans.
    pub fn beats_per_buffer(&self) -> f64 {
        self.frame_count as f64 * self.tempo.0 / (60.0 * self.sample_rate.0)
    }

    /// Converts a beat position, relative to the buffer's starting
    /// [BeatTime], into a sample offset from the buffer's start.
    pub fn beat_delta_to_samples(&self, beat_position: BeatTime, beat: f64) -> i64 {
        ((beat - beat_position.0) * self.tempo.samples_per_beat(self.sample_rate)).round() as i64
    }
}
