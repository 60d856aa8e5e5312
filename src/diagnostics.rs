// Copyright (c) 2024 Mike Tsao

//! A non-realtime channel the audio thread can use to report degraded
//! conditions (dropped events, force-stopped notes) without blocking. Modeled
//! on the producer/consumer split in the MIDI interface service: the audio
//! thread only ever calls [DiagnosticsSender::try_send], which is lock-free
//! and never blocks; a control thread drains the paired receiver at its own
//! pace.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Something the audio thread wants a non-realtime observer to know about.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticEvent {
    /// [crate::error::EngineError::EventCapacityExhausted] happened while
    /// applying a queued `AddEvent` command.
    EventDropped {
        /// The sequence that was full.
        sequence_index: usize,
    },

    /// A new note-on would have overflowed the playing-note tracker, so the
    /// oldest sounding note was force-stopped to make room.
    NoteForceStopped {
        /// The pitch that was cut short.
        pitch: u8,
        /// The channel it was sounding on.
        channel: u8,
        /// The destination column it was sounding on.
        destination: u8,
    },
}

/// The audio-thread side of the diagnostics channel.
#[derive(Debug, Clone)]
pub struct DiagnosticsSender(Sender<DiagnosticEvent>);
impl DiagnosticsSender {
    /// Reports an event. Never blocks; if nobody is listening, the event is
    /// simply dropped along with the log line this also emits.
    pub fn report(&self, event: DiagnosticEvent) {
        log::warn!("sequencer diagnostic: {event:?}");
        let _ = self.0.try_send(event);
    }
}

/// The control-thread side of the diagnostics channel.
#[derive(Debug, Clone)]
pub struct DiagnosticsReceiver(Receiver<DiagnosticEvent>);
impl DiagnosticsReceiver {
    /// Drains all diagnostic events currently queued.
    pub fn drain(&self) -> Vec<DiagnosticEvent> {
        self.0.try_iter().collect()
    }
}

/// Creates a connected sender/receiver pair.
pub fn diagnostics_channel() -> (DiagnosticsSender, DiagnosticsReceiver) {
    let (sender, receiver) = unbounded();
    (DiagnosticsSender(sender), DiagnosticsReceiver(receiver))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_and_drain() {
        let (tx, rx) = diagnostics_channel();
        tx.report(DiagnosticEvent::EventDropped { sequence_index: 3 });
        let drained = rx.drain();
        assert_eq!(drained, vec![DiagnosticEvent::EventDropped { sequence_index: 3 }]);
        assert!(rx.drain().is_empty());
    }
}
