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
use tracing::{info, span, Level, Span};

use crate::clock::Clock;
use crate::engine::{Engine, State};
use crate::gpio::{Button, Gpio, Indicator};
use crate::transport::TransportController;

/// Half the blink period of the power and play indicators.
const BLINK_HALF_PERIOD_MICROS: u32 = 250_000;

/// How long the loop idles per tick when playback is parked. While playing,
/// the engine's own bounded waits pace the loop.
const IDLE_TICK_MICROS: u32 = 1_000;

/// The control loop context: one clock, one I/O driver, one engine, one
/// transport controller, all exclusively owned. Each step samples inputs,
/// debounces them, advances the engine by one unit of work, and refreshes
/// the indicators.
pub struct Session<C: Clock, G: Gpio> {
    clock: C,
    gpio: G,
    engine: Engine,
    transport: TransportController,
    span: Span,
}

impl<C: Clock, G: Gpio> Session<C, G> {
    /// Creates a new session around the given devices and engine.
    pub fn new(clock: C, gpio: G, engine: Engine) -> Session<C, G> {
        let now = clock.micros();
        Session {
            clock,
            gpio,
            engine,
            transport: TransportController::new(now),
            span: span!(Level::INFO, "session"),
        }
    }

    /// Starts playback as if the power button had been pressed.
    pub fn power_on(&mut self) {
        self.engine.power_on();
    }

    /// Runs one control loop step. Bounded: at most one short engine block
    /// plus one strike pulse.
    pub fn step(&mut self) {
        let now = self.clock.micros();
        let intents = self.transport.scan(&self.gpio, now);
        self.engine.step(&intents, &self.clock, &mut self.gpio);
        self.update_indicators();
    }

    /// Drives the control loop forever.
    pub fn run(&mut self) -> ! {
        let span = self.span.clone();
        let _enter = span.enter();
        info!("Control loop started.");

        loop {
            self.step();

            // Idle gently while parked so the loop doesn't spin; button
            // sampling at this cadence is far finer than the debounce
            // window.
            match self.engine.state() {
                State::Stopped | State::Paused | State::Error => {
                    self.clock.block_for(IDLE_TICK_MICROS)
                }
                _ => {}
            }
        }
    }

    fn update_indicators(&mut self) {
        let blink = (self.clock.micros() / BLINK_HALF_PERIOD_MICROS) % 2 == 0;
        let (power, play) = match self.engine.state() {
            State::Error => (blink, false),
            State::Stopped => (false, false),
            State::Paused => (true, blink),
            _ => (true, true),
        };

        self.gpio.set_indicator(Indicator::Power, power);
        self.gpio.set_indicator(Indicator::Play, play);
        for button in Button::ALL {
            self.gpio
                .set_indicator(Indicator::Activity(button), self.transport.held(button));
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use midly::{
        num::{u15, u28, u4, u7},
        Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
    };

    use crate::clock::{mock, Clock};
    use crate::engine::{Engine, State};
    use crate::gpio::{self, Button, Indicator};
    use crate::transport::DEBOUNCE_MICROS;

    use super::Session;

    /// Builds a playable installation on disk: config, playlist, and one
    /// single-note title.
    fn install() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("unable to create temp dir");

        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![vec![
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Midi {
                        channel: u4::new(0),
                        message: MidiMessage::NoteOn {
                            key: u7::new(crate::chimes::LOW_NOTE),
                            vel: u7::new(100),
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
        std::fs::write(dir.path().join("carol.mid"), bytes).expect("unable to write title");

        let mut playlist =
            std::fs::File::create(dir.path().join("playlist.txt")).expect("unable to create");
        write!(playlist, "carol.mid\n").expect("unable to write playlist");

        let config_path = dir.path().join("carillon.cfg");
        std::fs::write(&config_path, "playUrl=playlist.txt\n").expect("unable to write config");

        (dir, config_path)
    }

    /// Presses and releases a button through the mock I/O, stepping past
    /// the debounce window.
    fn press(session: &mut Session<mock::Clock, gpio::mock::Gpio>, button: Button) {
        session.gpio.press(button);
        session.step();
        session.clock.advance(DEBOUNCE_MICROS);
        session.step();
        session.gpio.release(button);
        session.step();
        session.clock.advance(DEBOUNCE_MICROS);
        session.step();
    }

    #[test]
    fn test_button_press_starts_playback() {
        let (_dir, config_path) = install();
        let mut session = Session::new(
            mock::Clock::at(0),
            gpio::mock::Gpio::new(),
            Engine::new(config_path),
        );

        session.step();
        assert_eq!(State::Stopped, session.engine.state());
        assert_eq!(Some(false), session.gpio.indicator(Indicator::Power));

        press(&mut session, Button::OnOff);
        assert_ne!(State::Stopped, session.engine.state());
        assert_eq!(Some(true), session.gpio.indicator(Indicator::Power));

        // The single title opens and its note strikes. The playlist is
        // circular, so stop stepping at the first strike.
        for _ in 0..10 {
            if !session.gpio.pulses().is_empty() {
                break;
            }
            session.step();
        }
        assert_eq!(vec![0], session.gpio.pulses());
    }

    #[test]
    fn test_pause_blinks_the_play_indicator() {
        let (_dir, config_path) = install();
        let mut session = Session::new(
            mock::Clock::at(0),
            gpio::mock::Gpio::new(),
            Engine::new(config_path),
        );

        press(&mut session, Button::OnOff);
        assert_eq!(Some(true), session.gpio.indicator(Indicator::Play));

        press(&mut session, Button::PlayPause);
        assert_eq!(State::Paused, session.engine.state());

        // The play indicator follows the blink phase while paused.
        let before = session.clock.micros();
        let phase = (before / super::BLINK_HALF_PERIOD_MICROS) % 2 == 0;
        assert_eq!(Some(phase), session.gpio.indicator(Indicator::Play));

        session.clock.advance(super::BLINK_HALF_PERIOD_MICROS);
        session.step();
        assert_eq!(Some(!phase), session.gpio.indicator(Indicator::Play));
    }

    #[test]
    fn test_activity_indicators_track_held_buttons() {
        let (_dir, config_path) = install();
        let mut session = Session::new(
            mock::Clock::at(0),
            gpio::mock::Gpio::new(),
            Engine::new(config_path),
        );

        session.gpio.press(Button::Aux);
        session.step();
        session.clock.advance(DEBOUNCE_MICROS);
        session.step();
        assert_eq!(
            Some(true),
            session.gpio.indicator(Indicator::Activity(Button::Aux))
        );

        session.gpio.release(Button::Aux);
        session.step();
        session.clock.advance(DEBOUNCE_MICROS);
        session.step();
        assert_eq!(
            Some(false),
            session.gpio.indicator(Indicator::Activity(Button::Aux))
        );
    }
}
