// Copyright (c) 2024 Mike Tsao

//! The realtime core: walks one buffer's worth of the subtick lattice,
//! matching queued events against it and writing MIDI into [OutputSlots].
//! This is the only code in the crate that runs on every audio callback;
//! everything upstream of it (the edit queue, the applier) exists to keep
//! this loop free of allocation, locking, and syscalls.

use crate::beat::{BeatCrossing, BeatSender};
use crate::clock::ClockGenerator;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSender};
use crate::note_tracker::{PlayingNote, PlayingNoteTracker};
use crate::output::{self, OutputSlots, CLOCK_DESTINATION, DESTINATION_COUNT};
use crate::prelude::*;
use crate::sequence::{MidiEvent, SequenceStore, SEQUENCE_COUNT};
use crate::util::Rng;

/// Swing is applied to the back half of each beat quarter: subticks landing
/// in the second half of a `PPQ / 4` segment are pushed later by `swing *
/// (PPQ / 8)` subticks.
const SWING_SEGMENT: i64 = PPQ / 4;
const SWING_UNIT: f64 = (PPQ / 8) as f64;

/// Drives [Self::render_timeline]. Holds the one piece of state that must
/// survive across subticks and buffers: whether the most recently evaluated
/// candidate event fired, for the next ratchet event to inherit.
#[derive(Debug, Default)]
pub struct Scheduler {
    chance_did_play: bool,
}
impl Scheduler {
    /// Walks the subtick lattice spanned by this buffer, matching queued
    /// events, releasing due notes, and interleaving MIDI clock bytes.
    /// `out` must already be zeroed for this buffer (the engine clears it
    /// once per callback, before the edit applier and this both write into
    /// it); `now_samples` is the host's running sample clock at the start of
    /// the buffer, which every emitted packet's timestamp is relative to.
    #[allow(clippy::too_many_arguments)]
    pub fn render_timeline(
        &mut self,
        now_samples: u64,
        settings: SequencerSettings,
        beat_position: BeatTime,
        swing: f32,
        store: &mut SequenceStore,
        tracker: &mut PlayingNoteTracker,
        clock: &mut ClockGenerator,
        rng: &mut Rng,
        out: &mut OutputSlots,
        diagnostics: &DiagnosticsSender,
        beats: &BeatSender,
    ) {
        if clock.take_stop_byte() {
            output::emit(out, CLOCK_DESTINATION, now_samples, &[status::CLOCK_STOP]);
        }
        if clock.take_start_byte() {
            output::emit(out, CLOCK_DESTINATION, now_samples, &[status::CLOCK_START]);
        }

        let beats_per_buffer = settings.beats_per_buffer();
        let start_subtick = (beat_position.0 * PPQ as f64).ceil() as i64;
        let end_subtick = ((beat_position.0 + beats_per_buffer) * PPQ as f64).ceil() as i64;

        for k in start_subtick..end_subtick {
            let segment = k.rem_euclid(PPQ);
            let k_beat = k as f64 / PPQ as f64;

            tracker.take_due(k_beat, |_slot, note| {
                let timestamp = Self::timestamp(&settings, beat_position, note.beat_time, now_samples);
                output::emit(
                    out,
                    note.destination as usize,
                    timestamp,
                    &[status::NOTE_OFF | note.channel, note.pitch, 0],
                );
            });

            if clock.is_on() && ClockGenerator::is_tick_subtick(k) {
                let timestamp = Self::timestamp(&settings, beat_position, k_beat, now_samples);
                output::emit(out, CLOCK_DESTINATION, timestamp, &[status::CLOCK_TICK]);
            }

            if segment == 0 {
                beats.notify(BeatCrossing {
                    beat: k_beat,
                    sequence_index: 0,
                });
            }

            for seq_index in 0..SEQUENCE_COUNT {
                self.match_sequence(
                    seq_index, k, segment, swing, &settings, beat_position, now_samples, store,
                    tracker, rng, out, diagnostics,
                );
            }
        }

        tracker.sweep_stopped();
    }

    fn match_sequence(
        &mut self,
        seq_index: usize,
        k: i64,
        segment: i64,
        swing: f32,
        settings: &SequencerSettings,
        beat_position: BeatTime,
        now_samples: u64,
        store: &mut SequenceStore,
        tracker: &mut PlayingNoteTracker,
        rng: &mut Rng,
        out: &mut OutputSlots,
        diagnostics: &DiagnosticsSender,
    ) {
        let active = store.is_active(seq_index);
        let Some(sequence) = store.get(seq_index) else {
            return;
        };
        let ratio = sequence.playback_ratio;
        let local_subtick = k.rem_euclid(sequence.lattice_len());

        let Some(sequence) = store.get_mut(seq_index) else {
            return;
        };
        for event in sequence.events_mut() {
            if !event.queued || event.effective_subtick(ratio) != local_subtick {
                continue;
            }
            // An inactive (muted, or not soloed while something else is)
            // sequence's candidates are skipped entirely: no skip-gate
            // advance, no ratchet-chain update.
            if !active {
                continue;
            }

            if !event.advance_skip_gate() {
                self.chance_did_play = false;
                continue;
            }

            let fires = if event.is_ratchet {
                self.chance_did_play
            } else {
                rng.rand_percent() < event.chance
            };
            self.chance_did_play = fires;
            if !fires {
                continue;
            }

            let mut emission_subtick = k;
            if segment.rem_euclid(SWING_SEGMENT) >= SWING_SEGMENT / 2 {
                emission_subtick += (swing as f64 * SWING_UNIT).round() as i64;
            }
            let emission_beat = emission_subtick as f64 / PPQ as f64;
            let timestamp = Self::timestamp(settings, beat_position, emission_beat, now_samples)
                .saturating_add_signed(event.offset as i64);

            let destination = (event.destination as usize).min(DESTINATION_COUNT - 1) as u8;
            let channel = event.channel.0;
            let pitch = event.data1.as_int();
            let velocity = event.data2.as_int();
            let is_note_on = (event.status & 0xf0) == status::NOTE_ON;

            if is_note_on {
                if let Some(slot) = tracker.find(pitch, channel, destination) {
                    if let Some(existing) = tracker.get(slot).copied() {
                        output::emit(
                            out,
                            destination as usize,
                            timestamp.saturating_sub(1),
                            &[status::NOTE_OFF | existing.channel, existing.pitch, 0],
                        );
                    }
                    tracker.remove(slot);
                }
            }

            let emitted = output::emit(
                out,
                destination as usize,
                timestamp,
                &[event.status | channel, pitch, velocity],
            );
            if emitted && is_note_on {
                let release_beat = emission_beat + event.duration / ratio;
                let note = PlayingNote {
                    beat_time: release_beat,
                    pitch,
                    channel,
                    destination,
                    sequence: seq_index,
                    stopped: false,
                };
                if let Some(evicted) = tracker.insert(note) {
                    output::emit(
                        out,
                        evicted.destination as usize,
                        timestamp,
                        &[status::NOTE_OFF | evicted.channel, evicted.pitch, 0],
                    );
                    log::warn!("{}", EngineError::NoteCapacityExhausted(evicted.sequence));
                    diagnostics.report(DiagnosticEvent::NoteForceStopped {
                        pitch: evicted.pitch,
                        channel: evicted.channel,
                        destination: evicted.destination,
                    });
                }
            }
        }
    }

    fn timestamp(
        settings: &SequencerSettings,
        beat_position: BeatTime,
        beat: f64,
        now_samples: u64,
    ) -> u64 {
        let offset = settings.beat_delta_to_samples(beat_position, beat).max(0) as u64;
        now_samples + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat::beat_channel;
    use crate::diagnostics::diagnostics_channel;

    struct Harness {
        scheduler: Scheduler,
        store: SequenceStore,
        tracker: PlayingNoteTracker,
        clock: ClockGenerator,
        rng: Rng,
        diagnostics: DiagnosticsSender,
        beats: BeatSender,
    }
    impl Harness {
        fn new() -> Self {
            let (diagnostics, _rx) = diagnostics_channel();
            let (beats, _brx) = beat_channel();
            Self {
                scheduler: Scheduler::default(),
                store: SequenceStore::default(),
                tracker: PlayingNoteTracker::default(),
                clock: ClockGenerator::new(),
                rng: Rng::new_with_seed(7),
                diagnostics,
                beats,
            }
        }

        fn run(&mut self, settings: SequencerSettings, beat_position: BeatTime) -> OutputSlots {
            let mut out = output::empty_output_slots();
            self.scheduler.render_timeline(
                0,
                settings,
                beat_position,
                0.0,
                &mut self.store,
                &mut self.tracker,
                &mut self.clock,
                &mut self.rng,
                &mut out,
                &self.diagnostics,
                &self.beats,
            );
            out
        }
    }

    fn settings() -> SequencerSettings {
        SequencerSettings {
            tempo: Tempo(120.0),
            sample_rate: SampleRate(48000.0),
            frame_count: 512,
        }
    }

    #[test]
    fn single_step_at_beat_zero_emits_note_on_and_tracks_note_off() {
        let mut h = Harness::new();
        h.store
            .get_mut(0)
            .unwrap()
            .add_event(MidiEvent::note(0.0, 60, 100, 0.25))
            .unwrap();

        let out = h.run(settings(), BeatTime(0.0));
        let note_on = out[0][0];
        assert_eq!(note_on.length, 3);
        assert_eq!(note_on.data[0], status::NOTE_ON);
        assert_eq!(note_on.data[1], 60);
        assert_eq!(note_on.timestamp, 0);
        assert_eq!(h.tracker.len(), 1, "note-on starts tracking a release");
    }

    #[test]
    fn zero_chance_event_never_fires() {
        let mut h = Harness::new();
        let event = crate::sequence::MidiEventBuilder::default()
            .beat_time(0.0)
            .status(status::NOTE_ON)
            .data1(60)
            .data2(100)
            .chance(0)
            .build()
            .unwrap();
        h.store.get_mut(0).unwrap().add_event(event).unwrap();

        let out = h.run(settings(), BeatTime(0.0));
        assert!(out.iter().all(|row| row[0].length == 0));
    }

    #[test]
    fn skip_one_fires_every_other_traversal() {
        let mut h = Harness::new();
        let event = crate::sequence::MidiEventBuilder::default()
            .beat_time(0.0)
            .status(status::NOTE_ON)
            .data1(60)
            .data2(100)
            .skip(1)
            .build()
            .unwrap();
        h.store.get_mut(0).unwrap().add_event(event).unwrap();
        h.store.get_mut(0).unwrap().set_length(1.0);

        let first = h.run(settings(), BeatTime(0.0));
        assert_eq!(first[0][0].length, 3, "fires on the first traversal");

        let second = h.run(settings(), BeatTime(1.0));
        assert!(
            second.iter().all(|row| row[0].length == 0),
            "skips the second"
        );
    }

    #[test]
    fn ratchet_inherits_the_preceding_candidates_outcome_and_ignores_own_chance() {
        let mut h = Harness::new();
        let lead = crate::sequence::MidiEventBuilder::default()
            .beat_time(0.0)
            .status(status::NOTE_ON)
            .data1(60)
            .data2(100)
            .chance(0)
            .build()
            .unwrap();
        let ratchet = crate::sequence::MidiEventBuilder::default()
            .beat_time(0.0)
            .status(status::NOTE_ON)
            .data1(61)
            .data2(100)
            .chance(100)
            .is_ratchet(true)
            .build()
            .unwrap();
        let seq = h.store.get_mut(0).unwrap();
        seq.add_event(lead).unwrap();
        seq.add_event(ratchet).unwrap();

        let out = h.run(settings(), BeatTime(0.0));
        assert!(
            out.iter().all(|row| row[0].length == 0),
            "ratchet silently inherits the lead event's did-not-fire outcome"
        );
    }

    #[test]
    fn mute_silences_a_sequence_regardless_of_matching_events() {
        let mut h = Harness::new();
        h.store
            .get_mut(0)
            .unwrap()
            .add_event(MidiEvent::note(0.0, 60, 100, 0.25))
            .unwrap();
        h.store.set_mute(0, true);

        let out = h.run(settings(), BeatTime(0.0));
        assert!(out.iter().all(|row| row[0].length == 0));
    }
}
