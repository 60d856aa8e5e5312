// Copyright (c) 2024 Mike Tsao

//! Drains the edit queue into the sequence store. Runs once per audio
//! callback, before [crate::scheduler::Scheduler::render_timeline], so every
//! command queued by a control thread is visible to that buffer's pass over
//! the lattice.

use crate::clock::ClockGenerator;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSender};
use crate::note_tracker::PlayingNoteTracker;
use crate::output::{self, OutputSlots};
use crate::prelude::*;
use crate::queue::{EditCommand, EditQueueConsumer};
use crate::sequence::SequenceStore;

/// Stateless; just a namespace for [Self::apply_all].
#[derive(Debug, Default)]
pub struct EditApplier;
impl EditApplier {
    /// Drains every command currently queued and applies it to `store`,
    /// `clock`, and `swing`. `StopAll` also force-releases every sounding
    /// note directly into `out`, at sample offset zero of this buffer,
    /// since a stopped transport can't wait for each note's own release
    /// beat.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_all(
        consumer: &EditQueueConsumer,
        store: &mut SequenceStore,
        clock: &mut ClockGenerator,
        swing: &mut f32,
        tracker: &mut PlayingNoteTracker,
        out: &mut OutputSlots,
        now_samples: u64,
        diagnostics: &DiagnosticsSender,
    ) {
        consumer.drain(|command| {
            log::trace!("applying {command}");
            Self::apply(command, store, clock, swing, tracker, out, now_samples, diagnostics)
        });
    }

    fn apply(
        command: EditCommand,
        store: &mut SequenceStore,
        clock: &mut ClockGenerator,
        swing: &mut f32,
        tracker: &mut PlayingNoteTracker,
        out: &mut OutputSlots,
        now_samples: u64,
        diagnostics: &DiagnosticsSender,
    ) {
        match command {
            EditCommand::AddEvent(event) => {
                let sequence_index = event.sequence_index;
                if let Some(sequence) = store.get_mut(sequence_index) {
                    if sequence.add_event(event).is_err() {
                        diagnostics.report(DiagnosticEvent::EventDropped { sequence_index });
                    }
                }
            }
            EditCommand::DeleteEvent {
                sequence_index,
                beat_time,
                pitch,
                channel,
            } => {
                if let Some(sequence) = store.get_mut(sequence_index) {
                    sequence.delete_event(beat_time, pitch, channel);
                }
            }
            EditCommand::ClearSequence(sequence_index) => {
                if let Some(sequence) = store.get_mut(sequence_index) {
                    sequence.clear();
                }
            }
            EditCommand::SetSequenceLength {
                sequence_index,
                length_beats,
            } => {
                if let Some(sequence) = store.get_mut(sequence_index) {
                    sequence.set_length(length_beats);
                }
            }
            EditCommand::SetStepDivision {
                sequence_index,
                ratio,
            } => {
                if let Some(sequence) = store.get_mut(sequence_index) {
                    sequence.set_playback_ratio(ratio);
                }
            }
            EditCommand::SetSwing(amount) => *swing = amount,
            EditCommand::SetMute { sequence_index, on } => store.set_mute(sequence_index, on),
            EditCommand::SetSolo { sequence_index, on } => store.set_solo(sequence_index, on),
            EditCommand::SetMidiClockOn(on) => {
                clock.set_on(on);
            }
            EditCommand::StopAll => {
                clock.stop();
                tracker.drain_all(|note| {
                    output::emit(
                        out,
                        note.destination as usize,
                        now_samples,
                        &[status::NOTE_OFF | note.channel, note.pitch, 0],
                    );
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::diagnostics_channel;
    use crate::queue::edit_queue;

    #[test]
    fn add_event_lands_in_the_right_sequence() {
        let (producer, consumer) = edit_queue(8);
        let mut store = SequenceStore::default();
        let mut clock = ClockGenerator::new();
        let mut swing = 0.0f32;
        let mut tracker = PlayingNoteTracker::default();
        let mut out = output::empty_output_slots();
        let (diagnostics, _rx) = diagnostics_channel();

        producer
            .push(EditCommand::AddEvent(MidiEvent::note(0.5, 64, 90, 0.25)))
            .unwrap();
        EditApplier::apply_all(
            &consumer, &mut store, &mut clock, &mut swing, &mut tracker, &mut out, 0,
            &diagnostics,
        );

        assert_eq!(store.get(0).unwrap().active_event_count(), 1);
    }

    #[test]
    fn stop_all_force_releases_every_sounding_note_and_stops_the_clock() {
        let (producer, consumer) = edit_queue(8);
        let mut store = SequenceStore::default();
        let mut clock = ClockGenerator::new();
        clock.set_on(true);
        clock.take_start_byte();
        let mut swing = 0.0f32;
        let mut tracker = PlayingNoteTracker::default();
        tracker.insert(crate::note_tracker::PlayingNote {
            beat_time: 1000.0,
            pitch: 60,
            channel: 0,
            destination: 2,
            sequence: 0,
            stopped: false,
        });
        let mut out = output::empty_output_slots();
        let (diagnostics, _rx) = diagnostics_channel();

        producer.push(EditCommand::StopAll).unwrap();
        EditApplier::apply_all(
            &consumer, &mut store, &mut clock, &mut swing, &mut tracker, &mut out, 0,
            &diagnostics,
        );

        assert!(tracker.is_empty());
        assert!(!clock.is_on());
        assert!(clock.take_stop_byte());
        assert_eq!(out[0][2].data[0], status::NOTE_OFF);
        assert_eq!(out[0][2].data[1], 60);
    }

    #[test]
    fn event_capacity_exhaustion_is_reported_via_diagnostics() {
        let (producer, consumer) = edit_queue(4096);
        let mut store = SequenceStore::default();
        let mut clock = ClockGenerator::new();
        let mut swing = 0.0f32;
        let mut tracker = PlayingNoteTracker::default();
        let mut out = output::empty_output_slots();
        let (diagnostics, rx) = diagnostics_channel();

        for i in 0..crate::sequence::MAX_EVENTS + 1 {
            producer
                .push(EditCommand::AddEvent(MidiEvent::note(i as f64, 60, 100, 0.1)))
                .unwrap();
        }
        EditApplier::apply_all(
            &consumer, &mut store, &mut clock, &mut swing, &mut tracker, &mut out, 0,
            &diagnostics,
        );

        assert_eq!(
            rx.drain(),
            vec![DiagnosticEvent::EventDropped { sequence_index: 0 }]
        );
    }
}
