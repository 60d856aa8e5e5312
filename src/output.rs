// Copyright (c) 2024 Mike Tsao

//! The per-buffer output matrix the scheduler and edit applier both write
//! into: `MIDI_PACKET_SIZE` time columns by `DESTINATION_COUNT` destination
//! columns, plus one dedicated column for MIDI clock bytes so they never
//! displace a note slot.

/// Number of time columns per buffer.
pub const MIDI_PACKET_SIZE: usize = 16;

/// Number of destination columns available to sequence events.
pub const DESTINATION_COUNT: usize = 8;

/// The dedicated column MIDI clock bytes are written to. One past the last
/// event destination, so clock traffic can never collide with a note.
pub const CLOCK_DESTINATION: usize = DESTINATION_COUNT;

const COLUMN_COUNT: usize = DESTINATION_COUNT + 1;

/// A single outgoing MIDI packet. `length == 0` means the slot is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MidiPacket {
    /// Number of valid bytes in `data`. Zero means empty.
    pub length: u8,
    /// Sample-accurate timestamp, in the host's sample clock.
    pub timestamp: u64,
    /// Raw MIDI bytes. At most 3 are ever used here.
    pub data: [u8; 3],
}

/// The per-buffer output matrix: `output_slots[p][c]`, `p` a time column and
/// `c` a destination (with [CLOCK_DESTINATION] reserved for clock bytes).
pub type OutputSlots = [[MidiPacket; COLUMN_COUNT]; MIDI_PACKET_SIZE];

/// Returns a freshly zeroed output matrix, ready for one buffer's worth of
/// packets.
pub fn empty_output_slots() -> OutputSlots {
    [[MidiPacket::default(); COLUMN_COUNT]; MIDI_PACKET_SIZE]
}

/// Finds the first empty time column for destination `column`, if any.
pub fn find_free_slot(slots: &OutputSlots, column: usize) -> Option<usize> {
    (0..MIDI_PACKET_SIZE).find(|&p| slots[p][column].length == 0)
}

/// Writes a 2- or 3-byte MIDI message into the first free time column of
/// `column`. Returns `false` (and writes nothing) if all columns are
/// occupied for this buffer.
pub fn emit(
    slots: &mut OutputSlots,
    column: usize,
    timestamp: u64,
    data: &[u8],
) -> bool {
    debug_assert!(data.len() <= 3);
    let Some(p) = find_free_slot(slots, column) else {
        return false;
    };
    let mut bytes = [0u8; 3];
    bytes[..data.len()].copy_from_slice(data);
    slots[p][column] = MidiPacket {
        length: data.len() as u8,
        timestamp,
        data: bytes,
    };
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_fills_columns_in_order() {
        let mut slots = empty_output_slots();
        assert!(emit(&mut slots, 0, 10, &[0x90, 60, 100]));
        assert!(emit(&mut slots, 0, 20, &[0x80, 60, 0]));
        assert_eq!(slots[0][0].timestamp, 10);
        assert_eq!(slots[1][0].timestamp, 20);
    }

    #[test]
    fn emit_returns_false_when_column_is_full() {
        let mut slots = empty_output_slots();
        for i in 0..MIDI_PACKET_SIZE {
            assert!(emit(&mut slots, 3, i as u64, &[0xB0, 1, 2]));
        }
        assert!(!emit(&mut slots, 3, 999, &[0xB0, 1, 2]));
    }

    #[test]
    fn clock_column_is_independent_of_note_columns() {
        let mut slots = empty_output_slots();
        for i in 0..MIDI_PACKET_SIZE {
            assert!(emit(&mut slots, 0, i as u64, &[0x90, 60, 100]));
        }
        // Destination 0 is full, but the clock column is untouched.
        assert!(emit(&mut slots, CLOCK_DESTINATION, 0, &[0xF8]));
    }
}
