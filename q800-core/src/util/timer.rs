// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Returns the first multiple of `period` strictly after `now`.
pub fn next_grid_deadline(now: u64, period: u64) -> u64 {
    (now / period + 1) * period
}

/// A one-shot deadline on the virtual clock. The owner re-arms it from its
/// expiry handler to get periodic behavior.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timer {
    deadline: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    pub fn arm(&mut self, deadline: u64) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn get_deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    pub fn set_deadline(&mut self, deadline: Option<u64>) {
        self.deadline = deadline;
    }

    /// Disarms the timer and returns true if it has expired at `now`.
    pub fn take_due(&mut self, now: u64) -> bool {
        let due = self.is_due(now);
        if due {
            self.deadline = None;
        }
        due
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
