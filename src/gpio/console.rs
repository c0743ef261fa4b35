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

use tracing::{debug, info, span, Level, Span};

use super::{Button, Indicator};

/// A console I/O driver. Stands in for board I/O when no hardware is
/// attached: chime strikes and indicator changes are logged, and all button
/// lines read as idle.
pub struct Gpio {
    indicators: HashMap<Indicator, bool>,
    span: Span,
}

impl Gpio {
    /// Creates a new console driver.
    pub fn new() -> Gpio {
        Gpio {
            indicators: HashMap::new(),
            span: span!(Level::INFO, "gpio (console)"),
        }
    }
}

impl Default for Gpio {
    fn default() -> Gpio {
        Gpio::new()
    }
}

impl super::Gpio for Gpio {
    fn read_button(&self, button: Button) -> bool {
        button.polarity().idle_level()
    }

    fn set_chime(&mut self, chime: usize, high: bool) {
        let _enter = self.span.enter();
        if high {
            info!(chime = chime, "Strike.");
        }
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        let _enter = self.span.enter();

        // Only log changes; indicators are refreshed every loop tick.
        if self.indicators.insert(indicator, on) != Some(on) {
            debug!(
                indicator = format!("{:?}", indicator),
                on = on,
                "Indicator changed."
            );
        }
    }
}
