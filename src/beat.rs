// Copyright (c) 2024 Mike Tsao

//! A non-realtime notification fired once per beat, for UI playheads and the
//! like. Same shape as [crate::diagnostics]: the audio thread only ever
//! calls [BeatSender::notify], which is lock-free and never blocks.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// One beat boundary crossed during a buffer, and which sequence's lattice
/// it was measured against (always `0`, the host's transport beat, today;
/// kept for forward compatibility with per-sequence downbeats).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatCrossing {
    /// The beat that was crossed.
    pub beat: f64,
    /// Reserved for future per-sequence downbeat reporting.
    pub sequence_index: usize,
}

/// The audio-thread side of the beat-notification channel.
#[derive(Debug, Clone)]
pub struct BeatSender(Sender<BeatCrossing>);
impl BeatSender {
    /// Reports a beat crossing. Never blocks; dropped silently if nobody is
    /// listening.
    pub fn notify(&self, crossing: BeatCrossing) {
        let _ = self.0.try_send(crossing);
    }
}

/// The control-thread side of the beat-notification channel.
#[derive(Debug, Clone)]
pub struct BeatReceiver(Receiver<BeatCrossing>);
impl BeatReceiver {
    /// Drains all beat crossings reported since the last call.
    pub fn drain(&self) -> Vec<BeatCrossing> {
        self.0.try_iter().collect()
    }
}

/// Creates a connected sender/receiver pair.
pub fn beat_channel() -> (BeatSender, BeatReceiver) {
    let (sender, receiver) = unbounded();
    (BeatSender(sender), BeatReceiver(receiver))
}
