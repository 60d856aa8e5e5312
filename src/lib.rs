// Copyright (c) 2024 Mike Tsao

//! A realtime MIDI step-sequencer engine core.
//!
//! The crate is split along the realtime boundary described in each
//! module's docs: control threads talk to the engine only through
//! [queue::EditQueueProducer], [diagnostics::DiagnosticsReceiver], and
//! [beat::BeatReceiver]; the audio thread talks to it only through
//! [engine::Sequencer::process]. Nothing on that second path allocates,
//! locks, or performs a syscall.
//!
//! ```
//! use pulsegrid::prelude::*;
//!
//! let (mut engine, handles) = Sequencer::new(DEFAULT_EDIT_QUEUE_CAPACITY);
//! handles
//!     .edits
//!     .push(EditCommand::AddEvent(MidiEvent::note(0.0, 60, 100, 0.25)))
//!     .unwrap();
//!
//! let settings = SequencerSettings {
//!     tempo: Tempo(120.0),
//!     sample_rate: SampleRate(48000.0),
//!     frame_count: 512,
//! };
//! let output = engine.process(0, settings, BeatTime(0.0));
//! assert_eq!(output[0][0].data[0], status::NOTE_ON);
//! ```

/// The crate's common imports.
pub mod prelude {
    pub use crate::applier::EditApplier;
    pub use crate::beat::{beat_channel, BeatCrossing, BeatReceiver, BeatSender};
    pub use crate::clock::ClockGenerator;
    pub use crate::diagnostics::{
        diagnostics_channel, DiagnosticEvent, DiagnosticsReceiver, DiagnosticsSender,
    };
    pub use crate::engine::{Sequencer, SequencerHandles, DEFAULT_EDIT_QUEUE_CAPACITY};
    pub use crate::error::EngineError;
    pub use crate::note_tracker::{PlayingNote, PlayingNoteTracker, NOTE_CAPACITY};
    pub use crate::output::{
        empty_output_slots, MidiPacket, OutputSlots, CLOCK_DESTINATION, DESTINATION_COUNT,
        MIDI_PACKET_SIZE,
    };
    pub use crate::queue::{edit_queue, EditCommand, EditQueueConsumer, EditQueueProducer};
    pub use crate::scheduler::Scheduler;
    pub use crate::sequence::{
        MidiEvent, MidiEventBuilder, MidiSequence, SequenceStore, MAX_EVENTS, SEQUENCE_COUNT,
    };
    pub use crate::types::prelude::*;
    pub use crate::util::Rng;
}

pub mod applier;
pub mod beat;
pub mod clock;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod note_tracker;
pub mod output;
pub mod queue;
pub mod scheduler;
pub mod sequence;
pub mod types;
pub mod util;
