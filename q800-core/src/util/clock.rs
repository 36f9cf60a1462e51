// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::Cell;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Monotonic virtual time shared by every timed component of the board.
/// Time only moves when the driver advances it.
pub struct VirtualClock {
    now: Cell<u64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    pub fn with_time(now_ns: u64) -> Self {
        Self {
            now: Cell::new(now_ns),
        }
    }

    pub fn advance(&self, delta_ns: u64) {
        self.now.set(self.now.get().saturating_add(delta_ns));
    }

    /// Moves the clock forward to `deadline`. Deadlines in the past are ignored.
    pub fn advance_to(&self, deadline: u64) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now.get() / NANOS_PER_MILLI
    }

    pub fn now_ns(&self) -> u64 {
        self.now.get()
    }

    pub fn now_secs(&self) -> u64 {
        self.now.get() / NANOS_PER_SEC
    }

    pub fn reset(&self) {
        self.now.set(0);
    }

    /// Restores the clock from a snapshot. Unlike `advance_to` this may move time back.
    pub fn set_now(&self, now_ns: u64) {
        self.now.set(now_ns);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let clock = VirtualClock::new();
        clock.advance_to(5 * NANOS_PER_MILLI);
        clock.advance_to(NANOS_PER_MILLI);
        assert_eq!(5, clock.now_ms());
        clock.advance(NANOS_PER_SEC);
        assert_eq!(1, clock.now_secs());
        assert_eq!(1_005_000_000, clock.now_ns());
    }
}
