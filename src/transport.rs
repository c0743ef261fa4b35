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
use tracing::debug;

use crate::clock::wrapping_delta;
use crate::gpio::{Button, Gpio};

/// How long a raw level must hold steady before the debounced state trusts
/// it.
pub const DEBOUNCE_MICROS: u32 = 50_000;

/// One-shot transport commands derived from button edges, consumed by the
/// player at the top of every state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Stop playback, or start it again from Stopped.
    OnOff,
    /// Pause playback, or resume it from Paused.
    PlayPause,
    /// Abandon the current file and move on.
    Skip,
    /// Flip the pending shuffle flag.
    Shuffle,
}

/// Debounce state for one input line. Fed one logical sample per control
/// loop tick; the held state follows the raw state only once it has been
/// stable for the debounce window.
pub struct Debouncer {
    raw: bool,
    held: bool,
    last_change: u32,
}

impl Debouncer {
    /// Creates a debouncer whose line is idle at the given time.
    pub fn new(now: u32) -> Debouncer {
        Debouncer {
            raw: false,
            held: false,
            last_change: now,
        }
    }

    /// Feeds one sample. Returns true exactly once per press: on the
    /// debounced transition to held.
    pub fn sample(&mut self, level: bool, now: u32) -> bool {
        if level != self.raw {
            self.raw = level;
            self.last_change = now;
        }

        if self.raw != self.held
            && wrapping_delta(now, self.last_change) >= DEBOUNCE_MICROS as i32
        {
            self.held = self.raw;
            return self.held;
        }

        false
    }

    /// The current debounced state of the line.
    pub fn held(&self) -> bool {
        self.held
    }
}

/// Samples and debounces the five buttons and turns debounced press edges
/// into transport intents. Polarity correction happens here, at the sampling
/// boundary, so the debouncers only ever see logical levels.
pub struct TransportController {
    channels: [(Button, Debouncer); 5],
}

impl TransportController {
    /// Creates a controller with all buttons idle at the given time.
    pub fn new(now: u32) -> TransportController {
        TransportController {
            channels: Button::ALL.map(|button| (button, Debouncer::new(now))),
        }
    }

    /// Samples every button once and returns the intents fired this tick.
    pub fn scan(&mut self, gpio: &dyn Gpio, now: u32) -> Vec<Intent> {
        let mut intents = Vec::new();
        for (button, debouncer) in self.channels.iter_mut() {
            let level = button.polarity().apply(gpio.read_button(*button));
            if debouncer.sample(level, now) {
                debug!(button = format!("{:?}", button), "Button pressed.");
                if let Some(intent) = intent_for(*button) {
                    intents.push(intent);
                }
            }
        }
        intents
    }

    /// The debounced held state of the given button, for its activity
    /// indicator.
    pub fn held(&self, button: Button) -> bool {
        self.channels
            .iter()
            .find(|(b, _)| *b == button)
            .map(|(_, debouncer)| debouncer.held())
            .unwrap_or(false)
    }
}

/// The transport intent a button press produces. The aux button only drives
/// its activity indicator.
fn intent_for(button: Button) -> Option<Intent> {
    match button {
        Button::OnOff => Some(Intent::OnOff),
        Button::PlayPause => Some(Intent::PlayPause),
        Button::Skip => Some(Intent::Skip),
        Button::Shuffle => Some(Intent::Shuffle),
        Button::Aux => None,
    }
}

#[cfg(test)]
mod test {
    use crate::gpio::{self, Button};

    use super::{Debouncer, Intent, TransportController, DEBOUNCE_MICROS};

    #[test]
    fn test_short_glitch_is_ignored() {
        let mut debouncer = Debouncer::new(0);

        // A transition sustained for less than the window never changes the
        // held state.
        assert!(!debouncer.sample(true, 0));
        assert!(!debouncer.sample(true, DEBOUNCE_MICROS - 1));
        assert!(!debouncer.sample(false, DEBOUNCE_MICROS));
        assert!(!debouncer.sample(false, DEBOUNCE_MICROS * 3));
        assert!(!debouncer.held());
    }

    #[test]
    fn test_sustained_press_fires_once() {
        let mut debouncer = Debouncer::new(0);

        assert!(!debouncer.sample(true, 0));
        assert!(debouncer.sample(true, DEBOUNCE_MICROS));
        assert!(debouncer.held());

        // Holding the button produces no further edges.
        assert!(!debouncer.sample(true, DEBOUNCE_MICROS * 2));
        assert!(!debouncer.sample(true, DEBOUNCE_MICROS * 10));

        // The release edge is debounced the same way but fires no press.
        assert!(!debouncer.sample(false, DEBOUNCE_MICROS * 11));
        assert!(!debouncer.sample(false, DEBOUNCE_MICROS * 12));
        assert!(!debouncer.held());
    }

    #[test]
    fn test_bounce_restarts_the_window() {
        let mut debouncer = Debouncer::new(0);

        assert!(!debouncer.sample(true, 0));
        // The contact bounces just before the window elapses.
        assert!(!debouncer.sample(false, DEBOUNCE_MICROS - 1));
        assert!(!debouncer.sample(true, DEBOUNCE_MICROS));
        // The window restarts from the last change.
        assert!(!debouncer.sample(true, DEBOUNCE_MICROS * 2 - 1));
        assert!(debouncer.sample(true, DEBOUNCE_MICROS * 2));
    }

    #[test]
    fn test_scan_maps_buttons_to_intents() {
        let mut gpio = gpio::mock::Gpio::new();
        let mut transport = TransportController::new(0);

        assert!(transport.scan(&gpio, 0).is_empty());

        // Press play/pause and the inverted-polarity shuffle switch.
        gpio.press(Button::PlayPause);
        gpio.press(Button::Shuffle);
        assert!(transport.scan(&gpio, 1).is_empty());

        let intents = transport.scan(&gpio, 1 + DEBOUNCE_MICROS);
        assert_eq!(vec![Intent::PlayPause, Intent::Shuffle], intents);
        assert!(transport.held(Button::PlayPause));
        assert!(transport.held(Button::Shuffle));

        // Edge-triggered: holding fires nothing further.
        assert!(transport.scan(&gpio, 2 * DEBOUNCE_MICROS).is_empty());
    }

    #[test]
    fn test_aux_button_fires_no_intent() {
        let mut gpio = gpio::mock::Gpio::new();
        let mut transport = TransportController::new(0);

        gpio.press(Button::Aux);
        transport.scan(&gpio, 1);
        assert!(transport.scan(&gpio, 1 + DEBOUNCE_MICROS).is_empty());
        assert!(transport.held(Button::Aux));
    }
}
