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
use std::time::{Duration, Instant};

/// The time source for the player. The counter is a 32 bit microsecond value
/// that wraps roughly every 71.6 minutes, so all arithmetic on it must be
/// wrapping. [`wrapping_delta`] gives the correct difference across a single
/// wraparound.
pub trait Clock {
    /// The current value of the monotonic microsecond counter.
    fn micros(&self) -> u32;

    /// Blocks the caller for the given number of microseconds. Callers are
    /// expected to keep individual blocks short and bounded.
    fn block_for(&self, micros: u32);
}

/// Computes `a - b` on the wrapping microsecond counter as a signed count.
/// Positive means `a` is later than `b`.
pub fn wrapping_delta(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// The real time source, anchored to an [`Instant`] taken at construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn micros(&self) -> u32 {
        self.origin.elapsed().as_micros() as u32
    }

    fn block_for(&self, micros: u32) {
        spin_sleep::sleep(Duration::from_micros(u64::from(micros)));
    }
}

pub mod mock {
    use std::cell::Cell;

    /// A mock clock. Time only moves when the test advances it or when the
    /// player blocks on it.
    pub struct Clock {
        now: Cell<u32>,
    }

    impl Clock {
        /// Creates a mock clock starting at the given counter value.
        pub fn at(now: u32) -> Clock {
            Clock { now: Cell::new(now) }
        }

        /// Advances the counter by the given number of microseconds.
        pub fn advance(&self, micros: u32) {
            self.now.set(self.now.get().wrapping_add(micros));
        }
    }

    impl super::Clock for Clock {
        fn micros(&self) -> u32 {
            self.now.get()
        }

        fn block_for(&self, micros: u32) {
            self.advance(micros);
        }
    }
}
