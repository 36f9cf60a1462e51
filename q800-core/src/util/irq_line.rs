// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;
use log::LogLevel;

/// Autovector base of the 68k; interrupt level n is delivered on vector 24 + n.
pub const AUTOVECTOR_BASE: u8 = 24;

/// Open-drain interrupt line shared by several sources. Each source owns one
/// bit of the signal, and the line stays asserted while any bit is set.
/// The priority is the highest asserted source plus one, matching the
/// level-encoded 68k IPL pins.
pub struct IrqLine {
    kind: &'static str,
    signal: u8,
}

impl IrqLine {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, signal: 0 }
    }

    /// Returns the priority level of the highest asserted source, 0 when idle.
    pub fn get_level(&self) -> u8 {
        (0..8)
            .rev()
            .find(|&source| self.signal.get_bit(source))
            .map_or(0, |source| source as u8 + 1)
    }

    pub fn get_signal(&self) -> u8 {
        self.signal
    }

    pub fn get_vector(&self) -> Option<u8> {
        match self.get_level() {
            0 => None,
            level => Some(AUTOVECTOR_BASE + level),
        }
    }

    pub fn is_low(&self) -> bool {
        self.signal != 0
    }

    pub fn reset(&mut self) {
        self.signal = 0;
    }

    pub fn set_low(&mut self, source: usize, value: bool) {
        if self.signal.get_bit(source) != value
            && log_enabled!(target: "via::irq", LogLevel::Trace)
        {
            trace!(
                target: "via::irq", "{}.{} {}",
                self.kind,
                source,
                if value { "set" } else { "cleared" }
            );
        }
        self.signal.set_bit(source, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tracks_highest_source() {
        let mut line = IrqLine::new("cpu");
        assert_eq!(0, line.get_level());
        assert_eq!(None, line.get_vector());
        line.set_low(0, true);
        assert_eq!(1, line.get_level());
        line.set_low(1, true);
        assert_eq!(2, line.get_level());
        assert_eq!(Some(26), line.get_vector());
        line.set_low(1, false);
        assert_eq!(1, line.get_level());
        assert_eq!(Some(25), line.get_vector());
        line.set_low(0, false);
        assert_eq!(false, line.is_low());
    }
}
