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
use std::error::Error;
use std::fs;
use std::path::Path;

mod smf;
pub mod mock;

/// A structural section of a MIDI stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// A track chunk. Events can be read from it.
    Track,
    /// The end of the stream. No further chunks follow.
    EndOfStream,
    /// A chunk of a type the player does not handle.
    Other,
}

/// A decoded event, reduced to what the player needs. Note velocity and
/// channel numbers are intentionally absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A set-tempo meta event.
    Tempo { micros_per_beat: u32 },
    /// A note-on channel message with its pitch.
    NoteOn { key: u8 },
    /// Any channel message other than a sounding note-on.
    OtherChannel,
    /// Any other meta or sysex event.
    Other,
    /// The end of the current track chunk.
    EndOfTrack,
}

/// An event together with the tick delta since the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub delta_ticks: u32,
    pub event: Event,
}

/// Typed error for stream reads so the player can report decode failures
/// distinctly from reads past the end of a track.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("malformed MIDI data: {0}")]
    Malformed(String),
    #[error("read past the end of the stream")]
    PastEnd,
}

/// A decoded MIDI stream. The player consumes chunks and events one at a
/// time and never seeks backwards.
pub trait Reader {
    /// Advances to the next chunk in the stream.
    fn open_chunk(&mut self) -> Result<Chunk, ReadError>;

    /// Reads the next event from the current track chunk.
    fn read_event(&mut self) -> Result<TimedEvent, ReadError>;

    /// The time division of the stream, in ticks per beat.
    fn ticks_per_beat(&self) -> u16;
}

/// Opens a reader over the Standard MIDI File at the given path.
pub fn open(path: &Path) -> Result<Box<dyn Reader>, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(Box::new(smf::Reader::parse(&bytes)?))
}
