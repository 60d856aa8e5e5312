// Copyright (c) 2024 Mike Tsao

//! The top-level engine: owns every realtime-owned piece of state and
//! exposes the one method an audio callback calls, plus the control-thread
//! handles used to drive it.

use crate::applier::EditApplier;
use crate::beat::{beat_channel, BeatReceiver, BeatSender};
use crate::clock::ClockGenerator;
use crate::diagnostics::{diagnostics_channel, DiagnosticsReceiver, DiagnosticsSender};
use crate::note_tracker::PlayingNoteTracker;
use crate::output::{self, OutputSlots};
use crate::prelude::*;
use crate::queue::{edit_queue, EditQueueConsumer, EditQueueProducer};
use crate::scheduler::Scheduler;
use crate::sequence::SequenceStore;
use crate::util::Rng;

/// Default capacity of the edit queue, generous enough that a burst of UI
/// edits between two audio callbacks won't overflow it under normal use.
pub const DEFAULT_EDIT_QUEUE_CAPACITY: usize = 256;

/// Control-thread-facing handles returned alongside a fresh [Sequencer].
/// Clone the ones you need to hand to other threads; [Sequencer] itself
/// never leaves the audio thread.
pub struct SequencerHandles {
    /// Submits edits. May be shared across multiple control threads; they
    /// serialize through its internal lock (the audio thread never touches
    /// it).
    pub edits: EditQueueProducer,
    /// Drains degraded-condition reports (dropped events, force-stopped
    /// notes).
    pub diagnostics: DiagnosticsReceiver,
    /// Drains beat-boundary notifications, e.g. for a UI playhead.
    pub beats: BeatReceiver,
}

/// The realtime MIDI step-sequencer engine. One instance per audio stream;
/// every method that runs on the audio thread takes `&mut self` and neither
/// allocates nor blocks.
pub struct Sequencer {
    store: SequenceStore,
    tracker: PlayingNoteTracker,
    clock: ClockGenerator,
    scheduler: Scheduler,
    swing: f32,
    rng: Rng,
    consumer: EditQueueConsumer,
    diagnostics_tx: DiagnosticsSender,
    beats_tx: BeatSender,
}
impl Sequencer {
    /// Creates a new engine and its control-thread handles. `edit_queue_capacity`
    /// bounds how many unconsumed edits can be in flight at once; see
    /// [DEFAULT_EDIT_QUEUE_CAPACITY].
    pub fn new(edit_queue_capacity: usize) -> (Self, SequencerHandles) {
        let (producer, consumer) = edit_queue(edit_queue_capacity);
        let (diagnostics_tx, diagnostics_rx) = diagnostics_channel();
        let (beats_tx, beats_rx) = beat_channel();
        let engine = Self {
            store: SequenceStore::default(),
            tracker: PlayingNoteTracker::default(),
            clock: ClockGenerator::new(),
            scheduler: Scheduler::default(),
            swing: 0.0,
            rng: Rng::default(),
            consumer,
            diagnostics_tx,
            beats_tx,
        };
        let handles = SequencerHandles {
            edits: producer,
            diagnostics: diagnostics_rx,
            beats: beats_rx,
        };
        (engine, handles)
    }

    /// The one call an audio callback makes: applies every edit queued since
    /// the last buffer, then renders this buffer's slice of the timeline.
    /// `now_samples` is the host's own running sample counter at the start
    /// of this buffer, which every emitted packet's timestamp is relative
    /// to; the host owns this clock; it may jump across stream restarts or
    /// underruns, and this engine never tries to free-run its own copy.
    /// Returns the packets to forward to each MIDI destination.
    pub fn process(
        &mut self,
        now_samples: u64,
        settings: SequencerSettings,
        beat_position: BeatTime,
    ) -> OutputSlots {
        let mut out = output::empty_output_slots();

        EditApplier::apply_all(
            &self.consumer,
            &mut self.store,
            &mut self.clock,
            &mut self.swing,
            &mut self.tracker,
            &mut out,
            now_samples,
            &self.diagnostics_tx,
        );

        self.scheduler.render_timeline(
            now_samples,
            settings,
            beat_position,
            self.swing,
            &mut self.store,
            &mut self.tracker,
            &mut self.clock,
            &mut self.rng,
            &mut out,
            &self.diagnostics_tx,
            &self.beats_tx,
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EditCommand;

    fn settings() -> SequencerSettings {
        SequencerSettings {
            tempo: Tempo(120.0),
            sample_rate: SampleRate(48000.0),
            frame_count: 512,
        }
    }

    #[test]
    fn an_edit_queued_before_the_callback_is_audible_in_that_same_callback() {
        let (mut engine, handles) = Sequencer::new(DEFAULT_EDIT_QUEUE_CAPACITY);
        handles
            .edits
            .push(EditCommand::AddEvent(MidiEvent::note(0.0, 60, 100, 0.25)))
            .unwrap();

        let out = engine.process(0, settings(), BeatTime(0.0));
        assert_eq!(out[0][0].data[0], status::NOTE_ON);
        assert_eq!(out[0][0].data[1], 60);
    }

    #[test]
    fn an_invalid_sequence_index_is_rejected_synchronously_and_never_applied() {
        let (_engine, handles) = Sequencer::new(DEFAULT_EDIT_QUEUE_CAPACITY);
        let result = handles.edits.push(EditCommand::ClearSequence(999));
        assert_eq!(
            result,
            Err(crate::error::EngineError::SequenceIndexOutOfRange(999))
        );
    }

    #[test]
    fn packet_timestamps_are_relative_to_the_hosts_own_sample_clock() {
        let (mut engine, handles) = Sequencer::new(DEFAULT_EDIT_QUEUE_CAPACITY);
        handles
            .edits
            .push(EditCommand::AddEvent(MidiEvent::note(0.0, 60, 100, 0.25)))
            .unwrap();

        // A host-supplied `now_samples` that doesn't start at zero (e.g.
        // because the stream has been running, or just restarted after an
        // underrun) lands directly in the emitted packet's timestamp.
        let out = engine.process(1_000_000, settings(), BeatTime(0.0));
        assert_eq!(out[0][0].timestamp, 1_000_000);
    }
}
