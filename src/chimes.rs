// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tracing::warn;

use crate::clock::Clock;
use crate::gpio::Gpio;

/// The number of chime solenoids on the instrument.
pub const CHIME_COUNT: usize = 8;

/// The lowest note the instrument can sound. Notes map to chimes
/// chromatically from here.
pub const LOW_NOTE: u8 = 60;

/// How long a solenoid line is held high for one strike. Short enough to
/// stay inside the solenoid's average duty-cycle limit at expected tempos.
pub const STRIKE_MICROS: u32 = 15_000;

/// Maps a MIDI note number to its chime index, if the instrument has one.
pub fn chime_for_note(note: u8) -> Option<usize> {
    if note < LOW_NOTE {
        return None;
    }
    let chime = usize::from(note - LOW_NOTE);
    if chime < CHIME_COUNT {
        Some(chime)
    } else {
        None
    }
}

/// The set of notes scheduled to strike at one instant. Bounded by the
/// number of chimes; notes past capacity are dropped, never queued.
pub struct NoteQueue {
    notes: Vec<u8>,
}

impl NoteQueue {
    /// Creates an empty queue.
    pub fn new() -> NoteQueue {
        NoteQueue {
            notes: Vec::with_capacity(CHIME_COUNT),
        }
    }

    /// Appends a note to the pending strike. A full queue drops the note
    /// with a diagnostic and playback continues.
    pub fn push(&mut self, note: u8) {
        if self.notes.len() >= CHIME_COUNT {
            warn!(note = note, "Note queue is full, dropping note.");
            return;
        }
        self.notes.push(note);
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Discards any pending notes.
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Strikes every queued note in queue order and clears the queue. Notes
    /// outside the chime range are skipped with a diagnostic. A pulse that
    /// begins always completes; the line never stays high.
    pub fn flush(&mut self, gpio: &mut dyn Gpio, clock: &dyn Clock) {
        for note in self.notes.drain(..) {
            match chime_for_note(note) {
                Some(chime) => {
                    gpio.set_chime(chime, true);
                    clock.block_for(STRIKE_MICROS);
                    gpio.set_chime(chime, false);
                }
                None => warn!(note = note, "Note outside the chime range, skipping."),
            }
        }
    }
}

impl Default for NoteQueue {
    fn default() -> NoteQueue {
        NoteQueue::new()
    }
}
