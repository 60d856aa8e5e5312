// Copyright (c) 2024 Mike Tsao

//! Error types. The audio thread never fails: every [EngineError] variant
//! here is either returned synchronously to a control-thread caller, or
//! logged to the non-realtime [diagnostics](crate::diagnostics) channel, and
//! the engine degrades gracefully in both cases.

use thiserror::Error;

/// Errors produced by the engine. None of these are fatal; each is a
/// rejected or degraded operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The edit queue has no room for another command. The caller may retry
    /// or drop the edit; nothing was applied.
    #[error("edit queue is full")]
    QueueFull,

    /// A command referenced a sequence index outside `[0, S)`.
    #[error("sequence index {0} is out of range")]
    SequenceIndexOutOfRange(usize),

    /// A sequence's event table is already at [crate::sequence::MAX_EVENTS];
    /// the new event was dropped.
    #[error("sequence {0} has no room for another event")]
    EventCapacityExhausted(usize),

    /// The playing-note tracker is already at
    /// [crate::note_tracker::NOTE_CAPACITY]; the oldest sounding note was
    /// force-stopped and replaced. Never returned to a caller — it happens
    /// entirely on the audio thread — but logged the same way
    /// [Self::EventCapacityExhausted] would be if it ever needed to be.
    #[error("sequence {0} has no room for another playing note")]
    NoteCapacityExhausted(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offending_sequence() {
        assert_eq!(
            EngineError::EventCapacityExhausted(3).to_string(),
            "sequence 3 has no room for another event"
        );
        assert_eq!(
            EngineError::NoteCapacityExhausted(3).to_string(),
            "sequence 3 has no room for another playing note"
        );
    }
}
