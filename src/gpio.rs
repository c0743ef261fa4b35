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
pub mod console;
pub mod mock;

/// The five physical transport buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    OnOff,
    PlayPause,
    Skip,
    Shuffle,
    Aux,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::OnOff,
        Button::PlayPause,
        Button::Skip,
        Button::Shuffle,
        Button::Aux,
    ];

    /// The electrical polarity of the button's input line. The on/off and
    /// shuffle switches are wired active-low on the reference hardware.
    pub fn polarity(self) -> Polarity {
        match self {
            Button::OnOff | Button::Shuffle => Polarity::Inverted,
            _ => Polarity::Normal,
        }
    }
}

/// How a raw electrical level maps to a logical pressed level. Applied once
/// at the sampling boundary, per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inverted,
}

impl Polarity {
    /// Converts a raw electrical level into a logical pressed level.
    pub fn apply(self, level: bool) -> bool {
        match self {
            Polarity::Normal => level,
            Polarity::Inverted => !level,
        }
    }

    /// The electrical level of an idle (unpressed) line.
    pub fn idle_level(self) -> bool {
        match self {
            Polarity::Normal => false,
            Polarity::Inverted => true,
        }
    }
}

/// The front panel indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Solid while playing, off while stopped, blinking on a fault.
    Power,
    /// Solid while playing, blinking while paused.
    Play,
    /// Lit while the button's debounced state is held.
    Activity(Button),
}

/// The raw digital I/O boundary: button lines in, chime solenoid lines and
/// indicators out.
pub trait Gpio {
    /// Samples the raw electrical level of a button input line.
    fn read_button(&self, button: Button) -> bool;

    /// Drives one chime solenoid line.
    fn set_chime(&mut self, chime: usize, high: bool);

    /// Drives a front panel indicator.
    fn set_indicator(&mut self, indicator: Indicator, on: bool);
}

#[cfg(test)]
mod test {
    use super::{Button, Polarity};

    #[test]
    fn test_polarity() {
        assert!(Polarity::Normal.apply(true));
        assert!(!Polarity::Normal.apply(false));
        assert!(!Polarity::Inverted.apply(true));
        assert!(Polarity::Inverted.apply(false));
    }

    #[test]
    fn test_idle_levels() {
        // An idle line must never read as logically pressed.
        for button in Button::ALL {
            let polarity = button.polarity();
            assert!(!polarity.apply(polarity.idle_level()));
        }
    }
}
