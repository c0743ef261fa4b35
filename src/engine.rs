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
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::chimes::NoteQueue;
use crate::clock::{wrapping_delta, Clock};
use crate::config::Settings;
use crate::gpio::Gpio;
use crate::midi::{self, Chunk, Event, Reader, TimedEvent};
use crate::playlist::{self, PlayOrder, Playlist};
use crate::transport::Intent;

/// The longest the engine will block in a single step while waiting for a
/// strike instant. Kept under the 16383 microsecond limit of the busy-wait
/// primitive on the reference hardware; longer waits are split across steps
/// so button sampling stays responsive.
pub const MAX_BLOCK_MICROS: u32 = 16_000;

/// The tempo assumed until the stream's first tempo event: 120 beats per
/// minute.
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// The playback states. Exactly one is active; Error is terminal until an
/// external reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// An unrecoverable fault. No playback logic runs.
    Error,
    /// Idle. The power button starts playback.
    Stopped,
    /// Parked mid-title, resumable without timing drift.
    Paused,
    /// Between titles; the next playlist entry has yet to be opened.
    EndFile,
    /// Between chunks of the open title.
    EndTrack,
    /// Consuming decoded events from the open track.
    Events,
    /// A batch of notes is queued and waiting for its strike instant.
    Waiting,
}

/// Per-track time accounting. Reset at the start of every file.
struct TrackClock {
    /// The counter value playback of this track is anchored to. Re-anchored
    /// on resume.
    start: u32,
    /// Microseconds of track time accumulated so far. Monotonic
    /// non-decreasing within a track.
    elapsed: u32,
    /// The current tempo, as truncated microseconds per tick.
    micros_per_tick: u32,
    ticks_per_beat: u16,
}

impl TrackClock {
    fn begin(now: u32, ticks_per_beat: u16) -> TrackClock {
        let ticks_per_beat = ticks_per_beat.max(1);
        TrackClock {
            start: now,
            elapsed: 0,
            micros_per_tick: DEFAULT_MICROS_PER_BEAT / u32::from(ticks_per_beat),
            ticks_per_beat,
        }
    }
}

/// Captured when playback pauses, consumed on resume.
struct PauseSnapshot {
    /// The state to return to.
    resume_state: State,
    /// How far ahead of the clock the next strike instant was at pause
    /// time.
    micros_to_next: i32,
}

/// The playback engine. Pulls decoded events from the MIDI reader, groups
/// simultaneous notes into strike batches, and releases each batch at the
/// correct instant, advancing by at most one unit of work per step.
pub struct Engine {
    state: State,
    track: TrackClock,
    queue: NoteQueue,
    /// A decoded event deferred for reprocessing on the next step. At most
    /// one event is buffered this way.
    lookahead: Option<TimedEvent>,
    reader: Option<Box<dyn Reader>>,
    playlist: Playlist,
    /// Valid only while playing; Stopped and Error hold no cursor.
    order: Option<PlayOrder>,
    snapshot: Option<PauseSnapshot>,
    /// Consulted lazily by the play order; never reorders a running track.
    shuffle_pending: bool,
    /// Running worst-case strike lateness, diagnostic only.
    worst_lateness: u32,
    config_path: PathBuf,
    media_dir: PathBuf,
    cache_path: PathBuf,
    rng: StdRng,
    span: Span,
}

impl Engine {
    /// Creates a stopped engine. Playback begins once the power button (or
    /// [`Engine::power_on`]) starts it.
    pub fn new(config_path: PathBuf) -> Engine {
        let media_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let cache_path = media_dir.join("playlist.cache");

        Engine {
            state: State::Stopped,
            track: TrackClock::begin(0, 96),
            queue: NoteQueue::new(),
            lookahead: None,
            reader: None,
            playlist: Playlist::empty(),
            order: None,
            snapshot: None,
            shuffle_pending: false,
            worst_lateness: 0,
            config_path,
            media_dir,
            cache_path,
            rng: StdRng::from_entropy(),
            span: span!(Level::INFO, "engine"),
        }
    }

    /// The active playback state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The worst strike lateness observed so far, in microseconds.
    pub fn worst_lateness(&self) -> u32 {
        self.worst_lateness
    }

    /// Advances playback by at most one unit of work: applying transport
    /// intents, opening a file or chunk, consuming one event, or one bounded
    /// wait/strike. Never blocks longer than [`MAX_BLOCK_MICROS`] plus one
    /// strike pulse.
    pub fn step(&mut self, intents: &[Intent], clock: &dyn Clock, gpio: &mut dyn Gpio) {
        let span = self.span.clone();
        let _enter = span.enter();

        // Transport intents preempt whatever the state handler would do.
        if self.apply_intents(intents, clock) {
            return;
        }

        match self.state {
            State::Stopped | State::Error | State::Paused => {}
            State::EndFile => self.next_file(clock),
            State::EndTrack => self.next_chunk(),
            State::Events => self.next_event(),
            State::Waiting => self.wait_and_strike(clock, gpio),
        }
    }

    /// Reloads configuration, re-caches the playlist, rebuilds the play
    /// order, and begins playback. A configuration failure is fatal; an
    /// empty playlist simply stays stopped.
    pub fn power_on(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        match self.reload() {
            Ok(0) => {
                warn!("Playlist is empty, nothing to play.");
                self.state = State::Stopped;
            }
            Ok(titles) => {
                info!(titles = titles, "Starting playback.");
                self.order = Some(PlayOrder::new(titles));
                self.state = State::EndFile;
            }
            Err(e) => {
                error!(err = e.to_string(), "Unable to start playback.");
                self.state = State::Error;
            }
        }
    }

    /// Reloads settings and rebuilds the cached playlist, returning the
    /// number of titles.
    fn reload(&mut self) -> Result<usize, Box<dyn Error>> {
        let settings = Settings::load(&self.config_path)?;
        if settings.ssid.is_some() || settings.password.is_some() {
            debug!("Network credentials configured, but network retrieval is unsupported.");
        }

        let source = playlist::resolve_in(&settings.play_url, &self.media_dir)?;
        playlist::cache(&source, &self.cache_path)?;
        self.playlist = Playlist::load(&self.cache_path)?;
        Ok(self.playlist.len())
    }

    /// Applies any transport intents. Returns true if this step's unit of
    /// work has been spent on them.
    fn apply_intents(&mut self, intents: &[Intent], clock: &dyn Clock) -> bool {
        for intent in intents {
            match intent {
                Intent::OnOff => match self.state {
                    State::Stopped => self.power_on(),
                    State::Error => {}
                    _ => self.stop(),
                },
                Intent::PlayPause => match self.state {
                    State::EndTrack | State::Events | State::Waiting => self.pause(clock),
                    State::Paused => self.resume(clock),
                    _ => {}
                },
                Intent::Skip => match self.state {
                    State::EndTrack | State::Events | State::Waiting => {
                        info!("Skipping to the next title.");
                        self.close_file();
                    }
                    _ => {}
                },
                Intent::Shuffle => match self.state {
                    State::Stopped | State::Error => {}
                    _ => {
                        self.shuffle_pending = !self.shuffle_pending;
                        info!(shuffle = self.shuffle_pending, "Shuffle toggled.");
                    }
                },
            }
        }

        !intents.is_empty()
    }

    /// Stops playback, releasing the open title and the play order.
    fn stop(&mut self) {
        self.reader = None;
        self.queue.clear();
        self.lookahead = None;
        self.snapshot = None;
        self.order = None;
        self.state = State::Stopped;
        info!("Playback stopped.");
    }

    /// Closes the open title and moves on to the next playlist entry.
    fn close_file(&mut self) {
        self.reader = None;
        self.queue.clear();
        self.lookahead = None;
        self.state = State::EndFile;
    }

    /// Parks the engine, remembering how far ahead the next strike instant
    /// was. Queued and pushed-back state is left untouched.
    fn pause(&mut self, clock: &dyn Clock) {
        let target = self.track.start.wrapping_add(self.track.elapsed);
        let micros_to_next = wrapping_delta(target, clock.micros());
        self.snapshot = Some(PauseSnapshot {
            resume_state: self.state,
            micros_to_next,
        });
        self.state = State::Paused;
        info!(micros_to_next = micros_to_next, "Paused.");
    }

    /// Re-anchors the track clock so the wait to the next event is exactly
    /// what it was at pause time, then returns to the saved state. No
    /// catch-up burst, no double wait.
    fn resume(&mut self, clock: &dyn Clock) {
        if let Some(snapshot) = self.snapshot.take() {
            self.track.start = clock
                .micros()
                .wrapping_add(snapshot.micros_to_next as u32)
                .wrapping_sub(self.track.elapsed);
            self.state = snapshot.resume_state;
            info!("Resumed.");
        }
    }

    /// Selects the next playlist entry via the play order and opens it. An
    /// unopenable title is skipped; the next step tries the next entry.
    fn next_file(&mut self, clock: &dyn Clock) {
        if self.playlist.is_empty() {
            self.state = State::Stopped;
            return;
        }
        let order = match self.order.as_mut() {
            Some(order) => order,
            None => {
                self.state = State::Stopped;
                return;
            }
        };

        let index = order.advance(self.shuffle_pending, &mut self.rng);
        let name = self.playlist.entry(index).to_string();
        match midi::open(&self.media_dir.join(&name)) {
            Ok(reader) => {
                info!(title = name, "Opened title.");
                self.track = TrackClock::begin(clock.micros(), reader.ticks_per_beat());
                self.reader = Some(reader);
                self.state = State::EndTrack;
            }
            Err(e) => {
                warn!(
                    title = name,
                    err = e.to_string(),
                    "Unable to open title, skipping."
                );
            }
        }
    }

    /// Opens the next chunk of the open title.
    fn next_chunk(&mut self) {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => {
                self.state = State::EndFile;
                return;
            }
        };

        match reader.open_chunk() {
            Ok(Chunk::Track) => {
                debug!("Opened track chunk.");
                self.state = State::Events;
            }
            Ok(Chunk::EndOfStream) => {
                debug!("End of stream.");
                self.close_file();
            }
            Ok(Chunk::Other) => {
                warn!("Unexpected chunk type, abandoning title.");
                self.close_file();
            }
            Err(e) => {
                warn!(err = e.to_string(), "Unable to open chunk, abandoning title.");
                self.close_file();
            }
        }
    }

    /// Consumes one decoded event, or the pushed-back one if present.
    fn next_event(&mut self) {
        let event = match self.lookahead.take() {
            Some(event) => event,
            None => {
                let reader = match self.reader.as_mut() {
                    Some(reader) => reader,
                    None => {
                        self.state = State::EndFile;
                        return;
                    }
                };
                match reader.read_event() {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(err = e.to_string(), "Unable to decode event, abandoning title.");
                        self.close_file();
                        return;
                    }
                }
            }
        };

        // Simultaneity grouping: a nonzero delta closes the pending batch.
        // The event is pushed back unconsumed and reprocessed after the
        // strike, so events sharing a zero delta land in one batch.
        if event.delta_ticks != 0 && !self.queue.is_empty() {
            self.lookahead = Some(event);
            self.state = State::Waiting;
            return;
        }

        // Accumulate the delta. Elapsed time within a track never moves
        // backward; an accumulation that would wrap is a file error, not
        // silent corruption.
        let elapsed = u64::from(self.track.elapsed)
            + u64::from(event.delta_ticks) * u64::from(self.track.micros_per_tick);
        if elapsed > u64::from(u32::MAX) {
            error!("Track time would wrap, abandoning title.");
            self.close_file();
            return;
        }
        self.track.elapsed = elapsed as u32;

        match event.event {
            Event::Tempo { micros_per_beat } => {
                // Applied immediately, truncating to the microsecond. A
                // queued batch never crosses a tempo boundary: a nonzero
                // delta would have closed it first.
                self.track.micros_per_tick =
                    micros_per_beat / u32::from(self.track.ticks_per_beat);
                debug!(
                    micros_per_tick = self.track.micros_per_tick,
                    "Tempo change."
                );
            }
            Event::NoteOn { key } => self.queue.push(key),
            Event::OtherChannel | Event::Other => {}
            Event::EndOfTrack => {
                if self.queue.is_empty() {
                    self.state = State::EndTrack;
                } else {
                    // Flush the final batch before leaving the track, then
                    // see the end of track again with an empty queue.
                    self.lookahead = Some(TimedEvent {
                        delta_ticks: 0,
                        event: Event::EndOfTrack,
                    });
                    self.state = State::Waiting;
                }
            }
        }
    }

    /// Waits for the queued batch's strike instant and releases it. Waits
    /// beyond the block ceiling return to the loop and re-enter on later
    /// steps; re-entry is idempotent.
    fn wait_and_strike(&mut self, clock: &dyn Clock, gpio: &mut dyn Gpio) {
        let target = self.track.start.wrapping_add(self.track.elapsed);
        let micros_to_wait = wrapping_delta(target, clock.micros());

        if micros_to_wait > MAX_BLOCK_MICROS as i32 {
            return;
        }

        if micros_to_wait > 0 {
            clock.block_for(micros_to_wait as u32);
        }

        let lateness = wrapping_delta(clock.micros(), target);
        if lateness > 0 && lateness as u32 > self.worst_lateness {
            self.worst_lateness = lateness as u32;
            debug!(micros = lateness, "New worst-case strike lateness.");
        }

        self.queue.flush(gpio, clock);
        self.state = State::Events;
    }
}

#[cfg(test)]
impl Engine {
    /// Installs an already-open reader as the current title, as next_file
    /// would after opening it.
    fn load_reader(&mut self, reader: Box<dyn Reader>, clock: &dyn Clock) {
        self.track = TrackClock::begin(clock.micros(), reader.ticks_per_beat());
        self.reader = Some(reader);
        self.state = State::EndTrack;
    }

    fn elapsed(&self) -> u32 {
        self.track.elapsed
    }

    fn micros_per_tick(&self) -> u32 {
        self.track.micros_per_tick
    }

    fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    fn shuffle_pending(&self) -> bool {
        self.shuffle_pending
    }
}
