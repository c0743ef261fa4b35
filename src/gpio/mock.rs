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
use std::collections::HashMap;

use super::{Button, Indicator};

/// A mock I/O driver. Doesn't actually drive anything; button levels are set
/// by the test and every chime line transition is recorded.
pub struct Gpio {
    buttons: HashMap<Button, bool>,
    transitions: Vec<(usize, bool)>,
    indicators: HashMap<Indicator, bool>,
}

impl Gpio {
    /// Creates a new mock driver with all buttons idle.
    pub fn new() -> Gpio {
        Gpio {
            buttons: HashMap::new(),
            transitions: Vec::new(),
            indicators: HashMap::new(),
        }
    }

    /// Holds the given button down, at the electrical level its polarity
    /// requires.
    pub fn press(&mut self, button: Button) {
        self.buttons.insert(button, !button.polarity().idle_level());
    }

    /// Releases the given button.
    pub fn release(&mut self, button: Button) {
        self.buttons.insert(button, button.polarity().idle_level());
    }

    /// The chimes pulsed so far, in strike order.
    pub fn pulses(&self) -> Vec<usize> {
        self.transitions
            .iter()
            .filter(|(_, high)| *high)
            .map(|(chime, _)| *chime)
            .collect()
    }

    /// The last driven state of the given indicator.
    pub fn indicator(&self, indicator: Indicator) -> Option<bool> {
        self.indicators.get(&indicator).copied()
    }

    /// Every low line should be returned to low after a pulse; true if no
    /// chime line is currently left high.
    pub fn all_lines_low(&self) -> bool {
        let mut levels: HashMap<usize, bool> = HashMap::new();
        for (chime, high) in self.transitions.iter() {
            levels.insert(*chime, *high);
        }
        levels.values().all(|high| !high)
    }
}

impl Default for Gpio {
    fn default() -> Gpio {
        Gpio::new()
    }
}

impl super::Gpio for Gpio {
    fn read_button(&self, button: Button) -> bool {
        self.buttons
            .get(&button)
            .copied()
            .unwrap_or_else(|| button.polarity().idle_level())
    }

    fn set_chime(&mut self, chime: usize, high: bool) {
        self.transitions.push((chime, high));
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        self.indicators.insert(indicator, on);
    }
}
