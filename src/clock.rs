// Copyright (c) 2024 Mike Tsao

//! The optional MIDI real-time clock stream: a start byte, 24 ticks per
//! quarter note, and a stop byte, aligned to the same subtick lattice the
//! scheduler walks.

use crate::types::prelude::*;

/// Emits `0xF8`/`0xFA`/`0xFC` bytes in step with the subtick lattice.
#[derive(Clone, Debug, Default)]
pub struct ClockGenerator {
    on: bool,
    /// True until the next eligible buffer emits a start byte, then cleared.
    send_start: bool,
    /// True once until the next buffer emits a stop byte, then cleared. Kept
    /// separate from `on` so the byte still goes out even though `on` has
    /// already flipped to `false` by the time the scheduler looks at it.
    pending_stop: bool,
}
impl ClockGenerator {
    /// Creates a generator with the clock off and a start byte pending for
    /// whenever it's turned on.
    pub fn new() -> Self {
        Self {
            on: false,
            send_start: true,
            pending_stop: false,
        }
    }

    /// Whether the clock is currently running.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Turns the clock on or off. Turning it off arms a pending stop byte
    /// (collected via [Self::take_stop_byte]) and re-arms the start byte for
    /// next time; turning it on does not itself emit anything (the start
    /// byte waits for the next eligible buffer, per [Self::take_start_byte]).
    /// Returns whether this call armed a stop byte.
    pub fn set_on(&mut self, on: bool) -> bool {
        let was_on = self.on;
        self.on = on;
        if was_on && !on {
            self.send_start = true;
            self.pending_stop = true;
            return true;
        }
        false
    }

    /// If a start byte is pending and the clock is on, clears the pending
    /// flag and returns `true` so the caller emits one `CLOCK_START` byte at
    /// sample offset zero of this buffer.
    pub fn take_start_byte(&mut self) -> bool {
        if self.on && self.send_start {
            self.send_start = false;
            true
        } else {
            false
        }
    }

    /// If a stop byte is pending, clears the flag and returns `true` so the
    /// caller emits one `CLOCK_STOP` byte at sample offset zero of this
    /// buffer. Independent of [Self::is_on], which may already be `false` by
    /// the time this is checked.
    pub fn take_stop_byte(&mut self) -> bool {
        if self.pending_stop {
            self.pending_stop = false;
            true
        } else {
            false
        }
    }

    /// Whether subtick `k` lands on a 24-PPQN clock tick.
    pub fn is_tick_subtick(k: i64) -> bool {
        k.rem_euclid(PPQ / MIDI_CLOCK_PPQN) == 0
    }

    /// Forces the clock off, arming a pending stop byte if it was on.
    pub fn stop(&mut self) {
        self.set_on(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_cadence_is_24_per_quarter_note() {
        let ticks = (0..PPQ).filter(|&k| ClockGenerator::is_tick_subtick(k)).count();
        assert_eq!(ticks as i64, MIDI_CLOCK_PPQN);
    }

    #[test]
    fn turning_on_then_off_emits_start_then_stop_once() {
        let mut c = ClockGenerator::new();
        assert!(!c.take_start_byte(), "not on yet");
        c.set_on(true);
        assert!(c.take_start_byte());
        assert!(!c.take_start_byte(), "only once per enable edge");

        assert!(c.set_on(false), "stop byte should be emitted");
        assert!(!c.set_on(false), "already off, no duplicate stop");
        assert!(c.take_stop_byte());
        assert!(!c.take_stop_byte(), "only once per disable edge");
    }

    #[test]
    fn re_enabling_emits_a_fresh_start_byte() {
        let mut c = ClockGenerator::new();
        c.set_on(true);
        c.take_start_byte();
        c.set_on(false);
        c.set_on(true);
        assert!(c.take_start_byte());
    }

    #[test]
    fn stop_byte_survives_past_the_on_flag_flipping() {
        let mut c = ClockGenerator::new();
        c.set_on(true);
        c.take_start_byte();
        c.stop();
        assert!(!c.is_on());
        assert!(c.take_stop_byte(), "stop byte still pending after on flips");
    }
}
