// Copyright (c) 2024 Mike Tsao

//! The sequence store: a fixed-capacity table of step sequences, each a
//! bounded array of [MidiEvent]s. Owned exclusively by the audio thread;
//! mutated only through [crate::applier::EditApplier].

use crate::prelude::*;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Maximum number of events a single [MidiSequence] can hold.
pub const MAX_EVENTS: usize = 2048;

/// Number of sequences in a [SequenceStore]: a drum-plus-harmony kit (four
/// drum voices, bass, chords, lead).
pub const SEQUENCE_COUNT: usize = 7;

/// A single programmed step. Lives inside a [MidiSequence]; `sequence_index`
/// records which one owns it so that [crate::queue::EditCommand::DeleteEvent]
/// can match on it alone.
#[derive(Clone, Copy, Debug, Builder, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct MidiEvent {
    /// Position within the sequence, in beats, before `playback_ratio` is
    /// applied. Nonnegative.
    pub beat_time: f64,

    /// Raw MIDI status byte (channel not yet ORed in). See
    /// [crate::types::midi::status].
    pub status: u8,

    /// First 7-bit data byte (pitch, for note messages).
    #[builder(setter(custom))]
    pub data1: u7,

    /// Second 7-bit data byte (velocity, for note messages).
    #[builder(setter(custom))]
    pub data2: u7,

    /// Note duration in beats. Meaningful only when `status` is note-on.
    #[builder(default = "0.0")]
    pub duration: f64,

    /// Probability in `[0, 100]` that this event fires on a given traversal.
    #[builder(default = "100")]
    pub chance: u8,

    /// The event fires only once every `skip + 1` traversals of its slot.
    #[builder(default = "0")]
    pub skip: u32,

    /// Internal counter, advanced once per traversal, modulo `skip + 1`.
    #[builder(default = "0")]
    pub skip_count: u32,

    /// Subtick micro-offset applied at emission time (swing/humanize
    /// source), added after the swing adjustment.
    #[builder(default = "0")]
    pub offset: i32,

    /// Output-slot column this event routes into, `[0, DESTINATION_COUNT)`.
    #[builder(default = "0")]
    pub destination: u8,

    /// MIDI channel, 0-15.
    #[builder(default)]
    pub channel: MidiChannel,

    /// Index of the owning sequence.
    #[builder(default = "0")]
    pub sequence_index: usize,

    /// If true, this event's firing outcome is inherited from the most
    /// recently evaluated candidate event in the same buffer, rather than
    /// drawn independently; its own `chance` is then ignored.
    #[builder(default = "false")]
    pub is_ratchet: bool,

    /// Whether the event is active. `false` tombstones it without removing
    /// it from the sequence's array.
    #[builder(default = "true")]
    pub queued: bool,
}
impl MidiEventBuilder {
    /// Sets `data1`, clamping to the 7-bit range.
    pub fn data1(&mut self, value: u8) -> &mut Self {
        self.data1 = Some(to_u7(value));
        self
    }

    /// Sets `data2`, clamping to the 7-bit range.
    pub fn data2(&mut self, value: u8) -> &mut Self {
        self.data2 = Some(to_u7(value));
        self
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(beat_time) = self.beat_time {
            if beat_time < 0.0 {
                return Err("beat_time must be nonnegative".to_string());
            }
        }
        if let Some(chance) = self.chance {
            if chance > 100 {
                return Err("chance must be in [0, 100]".to_string());
            }
        }
        Ok(())
    }
}
impl MidiEvent {
    /// Convenience constructor for a note-on/note-off pair's on-event. Most
    /// tests and callers want this rather than the full builder.
    pub fn note(beat_time: f64, pitch: u8, velocity: u8, duration: f64) -> Self {
        MidiEventBuilder::default()
            .beat_time(beat_time)
            .status(status::NOTE_ON)
            .data1(pitch)
            .data2(velocity)
            .duration(duration)
            .build()
            .expect("fixed fields are always valid")
    }

    /// This event's beat position after dividing by the sequence's playback
    /// ratio, i.e. the time coordinate the scheduler actually matches
    /// against.
    pub fn effective_beat(&self, playback_ratio: f64) -> f64 {
        self.beat_time / playback_ratio
    }

    /// [Self::effective_beat] projected onto the subtick lattice.
    pub fn effective_subtick(&self, playback_ratio: f64) -> i64 {
        (self.effective_beat(playback_ratio) * PPQ as f64).round() as i64
    }

    /// Advances [Self::skip_count] and returns whether the event fires this
    /// traversal of its slot.
    pub fn advance_skip_gate(&mut self) -> bool {
        let fires = self.skip_count == 0;
        self.skip_count = (self.skip_count + 1) % (self.skip + 1);
        fires
    }
}

/// Records and replays a single bounded sequence of [MidiEvent]s.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiSequence {
    /// Length in beats. The sequence wraps modulo this value.
    pub length: f64,

    /// Multiplier applied to beat positions; governs step division /
    /// playback speed. `effective_beat = event.beat_time / playback_ratio`.
    pub playback_ratio: f64,

    /// The sequence's events. Tombstoned entries (`queued == false`) are
    /// skipped by the scheduler but never removed, per
    /// [crate::sequence::MidiSequence::delete_event].
    events: Vec<MidiEvent>,
}
impl Default for MidiSequence {
    fn default() -> Self {
        Self {
            length: 1.0,
            playback_ratio: 1.0,
            events: Vec::with_capacity(MAX_EVENTS),
        }
    }
}
impl MidiSequence {
    /// The sequence's events, including tombstoned ones. The scheduler
    /// filters on `queued` itself so it can do a single linear pass.
    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    /// The sequence's events, mutably. The scheduler uses this to advance
    /// each event's skip gate as it matches subticks.
    pub fn events_mut(&mut self) -> &mut [MidiEvent] {
        &mut self.events
    }

    /// Number of non-tombstoned events.
    pub fn active_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.queued).count()
    }

    /// Appends an event if there's room. Never reallocates: `events` is
    /// preallocated to [MAX_EVENTS] capacity at construction.
    pub fn add_event(&mut self, event: MidiEvent) -> Result<(), EngineError> {
        if self.events.len() >= MAX_EVENTS {
            return Err(EngineError::EventCapacityExhausted(event.sequence_index));
        }
        self.events.push(event);
        Ok(())
    }

    /// Tombstones the first event matching `(beat_time, pitch, channel)`.
    /// Returns whether a match was found. Never compacts the array, so a
    /// sequence that has seen many deletes is not pruned; see
    /// [Self::add_event] for why that's fine memory-wise (capacity is fixed
    /// regardless).
    pub fn delete_event(&mut self, beat_time: f64, pitch: u8, channel: u8) -> bool {
        if let Some(event) = self.events.iter_mut().find(|e| {
            e.queued
                && e.beat_time == beat_time
                && e.data1.as_int() == pitch
                && e.channel.0 == channel
        }) {
            event.queued = false;
            true
        } else {
            false
        }
    }

    /// Tombstones every event and resets the event table. Events whose
    /// storage isn't needed anymore just sit there with `queued = false`
    /// until overwritten by a fresh sequence of adds.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Sets the wraparound length. Events whose `beat_time` now exceeds the
    /// new length simply never match in the scheduler; nothing is deleted.
    pub fn set_length(&mut self, length_beats: f64) {
        self.length = length_beats;
    }

    /// Sets the playback ratio. Existing events are reinterpreted against
    /// the new ratio the next time the scheduler matches them; nothing in
    /// this struct needs to change.
    pub fn set_playback_ratio(&mut self, ratio: f64) {
        self.playback_ratio = ratio;
    }

    /// The sequence's length projected onto the subtick lattice, at least
    /// one subtick so that modulo arithmetic never divides by zero.
    pub fn lattice_len(&self) -> i64 {
        ((self.length * PPQ as f64).round() as i64).max(1)
    }
}

/// A fixed-capacity table of [SEQUENCE_COUNT] sequences, plus their mute/solo
/// state. Exclusively owned and mutated by the audio thread.
#[derive(Clone, Debug)]
pub struct SequenceStore {
    sequences: [MidiSequence; SEQUENCE_COUNT],
    mute: [bool; SEQUENCE_COUNT],
    solo: [bool; SEQUENCE_COUNT],
}
impl Default for SequenceStore {
    fn default() -> Self {
        Self {
            sequences: std::array::from_fn(|_| MidiSequence::default()),
            mute: [false; SEQUENCE_COUNT],
            solo: [false; SEQUENCE_COUNT],
        }
    }
}
impl SequenceStore {
    /// Returns the sequence at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&MidiSequence> {
        self.sequences.get(index)
    }

    /// Returns the sequence at `index` mutably, or `None` if out of range.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut MidiSequence> {
        self.sequences.get_mut(index)
    }

    /// Iterates over every sequence alongside its index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &MidiSequence)> {
        self.sequences.iter().enumerate()
    }

    /// Whether any sequence in the store is soloed.
    pub fn any_soloed(&self) -> bool {
        self.solo.iter().any(|&s| s)
    }

    /// Whether `index` is muted.
    pub fn is_muted(&self, index: usize) -> bool {
        self.mute[index]
    }

    /// Whether `index` is soloed.
    pub fn is_soloed(&self, index: usize) -> bool {
        self.solo[index]
    }

    /// A sequence is silenced if it's muted, or if anything else in the
    /// store is soloed and it isn't.
    pub fn is_active(&self, index: usize) -> bool {
        if self.mute[index] {
            return false;
        }
        !self.any_soloed() || self.solo[index]
    }

    /// Sets mute state for `index`. Out-of-range indices are ignored; the
    /// caller already validated against [SEQUENCE_COUNT] before queuing.
    pub fn set_mute(&mut self, index: usize, on: bool) {
        if let Some(slot) = self.mute.get_mut(index) {
            *slot = on;
        }
    }

    /// Sets solo state for `index`.
    pub fn set_solo(&mut self, index: usize, on: bool) {
        if let Some(slot) = self.solo.get_mut(index) {
            *slot = on;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_delete_roundtrip() {
        let mut seq = MidiSequence::default();
        let event = MidiEvent::note(0.0, 60, 100, 0.25);
        assert!(seq.add_event(event).is_ok());
        assert_eq!(seq.active_event_count(), 1);
        assert!(seq.delete_event(0.0, 60, 0));
        assert_eq!(seq.active_event_count(), 0);
        assert!(!seq.delete_event(0.0, 60, 0), "already deleted");
    }

    #[test]
    fn capacity_exhaustion_is_reported_not_panicked() {
        let mut seq = MidiSequence::default();
        for i in 0..MAX_EVENTS {
            assert!(seq
                .add_event(MidiEvent::note(i as f64, 60, 100, 0.1))
                .is_ok());
        }
        assert_eq!(
            seq.add_event(MidiEvent::note(9999.0, 60, 100, 0.1)),
            Err(EngineError::EventCapacityExhausted(0))
        );
    }

    #[test]
    fn clear_then_add_matches_fresh_sequence() {
        let mut a = MidiSequence::default();
        a.add_event(MidiEvent::note(0.0, 60, 100, 0.25)).unwrap();
        a.clear();
        a.add_event(MidiEvent::note(0.5, 64, 90, 0.25)).unwrap();

        let mut b = MidiSequence::default();
        b.add_event(MidiEvent::note(0.5, 64, 90, 0.25)).unwrap();

        assert_eq!(a.events(), b.events());
    }

    #[test]
    fn shortening_length_does_not_prune_events() {
        let mut seq = MidiSequence::default();
        seq.add_event(MidiEvent::note(3.5, 60, 100, 0.25)).unwrap();
        seq.set_length(1.0);
        assert_eq!(seq.active_event_count(), 1, "event stays, just dormant");
    }

    #[test]
    fn solo_silences_everything_else() {
        let mut store = SequenceStore::default();
        store.set_solo(1, true);
        assert!(!store.is_active(0));
        assert!(store.is_active(1));
        assert!(!store.is_active(2));
    }

    #[test]
    fn mute_wins_over_lack_of_solo() {
        let mut store = SequenceStore::default();
        store.set_mute(0, true);
        assert!(!store.is_active(0));
        assert!(store.is_active(1));
    }
}
