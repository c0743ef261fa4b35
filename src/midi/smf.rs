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
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::{Chunk, Event, ReadError, TimedEvent};

/// A reader over a Standard MIDI File, decoded with midly. The file is
/// decoded up front and served to the player chunk by chunk.
pub struct Reader {
    ticks_per_beat: u16,
    tracks: Vec<Vec<TimedEvent>>,
    /// Index of the next chunk to open.
    next_track: usize,
    /// Position within the currently open chunk.
    next_event: usize,
}

impl Reader {
    /// Parses the given bytes as a Standard MIDI File.
    pub fn parse(bytes: &[u8]) -> Result<Reader, ReadError> {
        let smf = Smf::parse(bytes).map_err(|e| ReadError::Malformed(e.to_string()))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(_, _) => {
                return Err(ReadError::Malformed(
                    "SMPTE timecode division is not supported".to_string(),
                ))
            }
        };

        let tracks = smf
            .tracks
            .iter()
            .map(|track| {
                let mut events: Vec<TimedEvent> = track
                    .iter()
                    .map(|event| TimedEvent {
                        delta_ticks: event.delta.as_int(),
                        event: convert(&event.kind),
                    })
                    .collect();

                // Every track is supposed to close with an end-of-track meta
                // event. Supply one if the file omitted it.
                if events.last().map(|e| e.event) != Some(Event::EndOfTrack) {
                    events.push(TimedEvent {
                        delta_ticks: 0,
                        event: Event::EndOfTrack,
                    });
                }
                events
            })
            .collect();

        Ok(Reader {
            ticks_per_beat,
            tracks,
            next_track: 0,
            next_event: 0,
        })
    }
}

/// Reduces a midly event to the player's event model.
fn convert(kind: &TrackEventKind) -> Event {
    match kind {
        TrackEventKind::Meta(MetaMessage::Tempo(micros_per_beat)) => Event::Tempo {
            micros_per_beat: micros_per_beat.as_int(),
        },
        TrackEventKind::Meta(MetaMessage::EndOfTrack) => Event::EndOfTrack,
        TrackEventKind::Midi { message, .. } => match message {
            // A note-on with velocity zero is the conventional running-status
            // encoding of note-off, so it does not sound a chime.
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                Event::NoteOn { key: key.as_int() }
            }
            _ => Event::OtherChannel,
        },
        _ => Event::Other,
    }
}

impl super::Reader for Reader {
    fn open_chunk(&mut self) -> Result<Chunk, ReadError> {
        if self.next_track >= self.tracks.len() {
            return Ok(Chunk::EndOfStream);
        }

        self.next_event = 0;
        self.next_track += 1;
        Ok(Chunk::Track)
    }

    fn read_event(&mut self) -> Result<TimedEvent, ReadError> {
        if self.next_track == 0 {
            return Err(ReadError::PastEnd);
        }

        let track = &self.tracks[self.next_track - 1];
        match track.get(self.next_event) {
            Some(event) => {
                self.next_event += 1;
                Ok(*event)
            }
            None => Err(ReadError::PastEnd),
        }
    }

    fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }
}

#[cfg(test)]
mod test {
    use midly::{
        num::{u15, u24, u28, u4, u7},
        Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
    };

    use crate::midi::{Chunk, Event, ReadError, Reader as _};

    /// Serializes a one-track SMF with a tempo event and two notes.
    fn write_test_file() -> Vec<u8> {
        let note_on = |delta: u32, key: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(100),
                },
            },
        };

        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![vec![
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
                },
                note_on(0, 60),
                note_on(480, 62),
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Midi {
                        channel: u4::new(0),
                        message: MidiMessage::NoteOff {
                            key: u7::new(62),
                            vel: u7::new(0),
                        },
                    },
                },
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
                },
            ]],
        };

        let mut bytes = Vec::new();
        smf.write(&mut bytes).expect("unable to serialize SMF");
        bytes
    }

    #[test]
    fn test_parse_and_read() {
        let bytes = write_test_file();
        let mut reader = super::Reader::parse(&bytes).expect("parse should succeed");

        assert_eq!(480, reader.ticks_per_beat());
        assert_eq!(Chunk::Track, reader.open_chunk().expect("open chunk"));

        let expected = [
            (
                0,
                Event::Tempo {
                    micros_per_beat: 500_000,
                },
            ),
            (0, Event::NoteOn { key: 60 }),
            (480, Event::NoteOn { key: 62 }),
            (0, Event::OtherChannel),
            (0, Event::EndOfTrack),
        ];
        for (delta_ticks, event) in expected {
            let read = reader.read_event().expect("read event");
            assert_eq!(delta_ticks, read.delta_ticks);
            assert_eq!(event, read.event);
        }

        assert!(matches!(reader.read_event(), Err(ReadError::PastEnd)));
        assert_eq!(Chunk::EndOfStream, reader.open_chunk().expect("open chunk"));
    }

    #[test]
    fn test_event_before_chunk() {
        let bytes = write_test_file();
        let mut reader = super::Reader::parse(&bytes).expect("parse should succeed");
        assert!(matches!(reader.read_event(), Err(ReadError::PastEnd)));
    }

    #[test]
    fn test_malformed_file() {
        assert!(matches!(
            super::Reader::parse(b"not a midi file"),
            Err(ReadError::Malformed(_))
        ));
    }
}
