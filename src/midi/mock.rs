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
use std::collections::VecDeque;

use super::{Chunk, Event, ReadError, TimedEvent};

/// One scripted response from the mock reader.
enum Action {
    Chunk(Chunk),
    Event(TimedEvent),
    /// A decode failure surfaced on the next chunk or event read.
    Error,
}

/// A mock reader. Serves a scripted chunk/event sequence, including decode
/// errors, so the player can be driven without real files.
pub struct Reader {
    ticks_per_beat: u16,
    script: VecDeque<Action>,
}

impl Reader {
    /// Creates a mock reader with the given time division.
    pub fn new(ticks_per_beat: u16) -> Reader {
        Reader {
            ticks_per_beat,
            script: VecDeque::new(),
        }
    }

    /// Scripts a chunk.
    pub fn chunk(mut self, chunk: Chunk) -> Reader {
        self.script.push_back(Action::Chunk(chunk));
        self
    }

    /// Scripts an event with the given tick delta.
    pub fn event(mut self, delta_ticks: u32, event: Event) -> Reader {
        self.script
            .push_back(Action::Event(TimedEvent { delta_ticks, event }));
        self
    }

    /// Scripts a decode failure.
    pub fn error(mut self) -> Reader {
        self.script.push_back(Action::Error);
        self
    }
}

impl super::Reader for Reader {
    fn open_chunk(&mut self) -> Result<Chunk, ReadError> {
        match self.script.pop_front() {
            Some(Action::Chunk(chunk)) => Ok(chunk),
            Some(Action::Error) => Err(ReadError::Malformed("scripted failure".to_string())),
            Some(Action::Event(_)) => panic!("script expected a chunk next"),
            None => Ok(Chunk::EndOfStream),
        }
    }

    fn read_event(&mut self) -> Result<TimedEvent, ReadError> {
        match self.script.pop_front() {
            Some(Action::Event(event)) => Ok(event),
            Some(Action::Error) => Err(ReadError::Malformed("scripted failure".to_string())),
            Some(Action::Chunk(_)) => panic!("script expected an event next"),
            None => Err(ReadError::PastEnd),
        }
    }

    fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }
}
