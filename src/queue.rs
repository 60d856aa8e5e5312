// Copyright (c) 2024 Mike Tsao

//! The single-producer/single-consumer channel that carries edits from
//! control threads to the audio thread. Backed by [crossbeam::queue::ArrayQueue],
//! which preallocates its backing storage once at construction and never
//! allocates again, so pushing and popping are realtime-safe.

use crate::sequence::{MidiEvent, SEQUENCE_COUNT};
use crossbeam::queue::ArrayQueue;
use std::sync::Mutex;
use strum_macros::Display;

/// A command that mutates the [SequenceStore](crate::sequence::SequenceStore).
/// Every variant is `Copy`, so enqueuing never allocates. [Display] prints
/// just the variant name, for the applier's per-command trace logging.
#[derive(Clone, Copy, Debug, Display, PartialEq)]
pub enum EditCommand {
    /// Appends an event to a sequence, if it has room.
    AddEvent(MidiEvent),

    /// Removes the event matching `(sequence_index, beat_time, pitch,
    /// channel)`, if one exists.
    DeleteEvent {
        /// Index into the sequence store.
        sequence_index: usize,
        /// The event's beat time.
        beat_time: f64,
        /// The event's pitch (`data1`).
        pitch: u8,
        /// The event's MIDI channel.
        channel: u8,
    },

    /// Tombstones every event in a sequence.
    ClearSequence(usize),

    /// Sets a sequence's wraparound length, in beats.
    SetSequenceLength {
        /// Index into the sequence store.
        sequence_index: usize,
        /// The new length, in beats.
        length_beats: f64,
    },

    /// Sets a sequence's playback ratio (step division / playback speed).
    SetStepDivision {
        /// Index into the sequence store.
        sequence_index: usize,
        /// The new playback ratio.
        ratio: f64,
    },

    /// Sets the global swing amount, in `[0, 1]`.
    SetSwing(f32),

    /// Mutes or unmutes a sequence.
    SetMute {
        /// Index into the sequence store.
        sequence_index: usize,
        /// Whether the sequence should be muted.
        on: bool,
    },

    /// Solos or unsolos a sequence.
    SetSolo {
        /// Index into the sequence store.
        sequence_index: usize,
        /// Whether the sequence should be soloed.
        on: bool,
    },

    /// Turns the MIDI clock generator on or off.
    SetMidiClockOn(bool),

    /// Forces every sounding note off and stops the clock, if running.
    StopAll,
}
impl EditCommand {
    /// The sequence index this command targets, if any. Used by
    /// [EditQueueProducer::push] to reject out-of-range indices before they
    /// ever reach the audio thread.
    fn sequence_index(&self) -> Option<usize> {
        match *self {
            Self::AddEvent(event) => Some(event.sequence_index),
            Self::DeleteEvent { sequence_index, .. }
            | Self::ClearSequence(sequence_index)
            | Self::SetSequenceLength { sequence_index, .. }
            | Self::SetStepDivision { sequence_index, .. }
            | Self::SetMute { sequence_index, .. }
            | Self::SetSolo { sequence_index, .. } => Some(sequence_index),
            Self::SetSwing(_) | Self::SetMidiClockOn(_) | Self::StopAll => None,
        }
    }
}

/// The producer side, held by one or more control threads. If more than one
/// thread produces, they must serialize through [EditQueueProducer]'s
/// internal lock, which the audio thread never touches.
#[derive(Debug)]
pub struct EditQueueProducer {
    queue: std::sync::Arc<ArrayQueue<EditCommand>>,
    // Only contended when multiple control-thread producers share a handle;
    // the audio thread never locks this.
    serialize: std::sync::Arc<Mutex<()>>,
}
impl EditQueueProducer {
    /// Submits a command. Validates any sequence index the command carries
    /// before it ever reaches the queue, so a bad index is rejected
    /// synchronously rather than silently dropped on the audio thread.
    /// Returns `Err` if the index is out of range or the queue is full.
    pub fn push(&self, command: EditCommand) -> Result<(), crate::error::EngineError> {
        if let Some(index) = command.sequence_index() {
            if index >= SEQUENCE_COUNT {
                return Err(crate::error::EngineError::SequenceIndexOutOfRange(index));
            }
        }
        let _guard = self.serialize.lock().unwrap();
        self.queue
            .push(command)
            .map_err(|_| crate::error::EngineError::QueueFull)
    }
}

/// The consumer side, owned exclusively by the audio thread.
#[derive(Debug)]
pub struct EditQueueConsumer {
    queue: std::sync::Arc<ArrayQueue<EditCommand>>,
}
impl EditQueueConsumer {
    /// Drains every command currently queued, calling `f` for each in FIFO
    /// order. Bounded by the queue's capacity, so this never loops
    /// unboundedly.
    pub fn drain(&self, mut f: impl FnMut(EditCommand)) {
        while let Some(command) = self.queue.pop() {
            f(command);
        }
    }
}

/// Creates a connected producer/consumer pair with the given fixed capacity.
pub fn edit_queue(capacity: usize) -> (EditQueueProducer, EditQueueConsumer) {
    let queue = std::sync::Arc::new(ArrayQueue::new(capacity));
    (
        EditQueueProducer {
            queue: queue.clone(),
            serialize: std::sync::Arc::new(Mutex::new(())),
        },
        EditQueueConsumer { queue },
    )
}
