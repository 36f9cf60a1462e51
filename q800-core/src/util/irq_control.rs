// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const EVENT_MASK: u8 = 0x7f;

/// Interrupt flag (IFR) and enable (IER) pair of a 6522.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IrqControl {
    data: u8,
    mask: u8,
}

impl IrqControl {
    pub fn new() -> Self {
        Self { data: 0, mask: 0 }
    }

    pub fn clear_event(&mut self, bit: usize) {
        self.data.set_bit(bit, false);
    }

    pub fn clear_events(&mut self, events: u8) {
        self.data &= !(events & EVENT_MASK);
    }

    /// IFR as seen by the host: bit 7 mirrors the summary state.
    pub fn get_data(&self) -> u8 {
        let mut data = self.data;
        data.set_bit(7, self.is_triggered());
        data
    }

    /// IER as seen by the host: bit 7 always reads as one.
    pub fn get_mask(&self) -> u8 {
        self.mask | 0x80
    }

    pub fn get_raw_data(&self) -> u8 {
        self.data
    }

    pub fn get_raw_mask(&self) -> u8 {
        self.mask
    }

    pub fn is_triggered(&self) -> bool {
        (self.mask & self.data & EVENT_MASK) != 0
    }

    pub fn reset(&mut self) {
        self.data = 0;
        self.mask = 0;
    }

    pub fn set_event(&mut self, bit: usize) {
        self.data.set_bit(bit, true);
    }

    pub fn set_events(&mut self, events: u8) {
        self.data |= events & EVENT_MASK;
    }

    pub fn update_mask(&mut self, mask: u8) {
        /*
        Writing IER with bit 7 set enables every interrupt written as one,
        with bit 7 clear disables them. Bits written as zero are unaffected.
        */
        if mask.get_bit(7) {
            self.mask |= mask & EVENT_MASK;
        } else {
            self.mask &= !(mask & EVENT_MASK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_mask_set_and_clear() {
        let mut irq_control = IrqControl::new();
        irq_control.update_mask(0x82);
        irq_control.update_mask(0xc0);
        assert_eq!(0xc2, irq_control.get_mask());
        irq_control.update_mask(0x02);
        assert_eq!(0xc0, irq_control.get_mask());
    }

    #[test]
    fn summary_bit_follows_enabled_flags() {
        let mut irq_control = IrqControl::new();
        irq_control.set_event(1);
        assert_eq!(0x02, irq_control.get_data());
        irq_control.update_mask(0x82);
        assert_eq!(0x82, irq_control.get_data());
        irq_control.clear_events(0x82);
        assert_eq!(0x00, irq_control.get_data());
        assert_eq!(false, irq_control.is_triggered());
    }

    #[test]
    fn summary_bit_for_all_flags_and_enables() {
        for data in 0..0x80u8 {
            for mask in 0..0x80u8 {
                let mut irq_control = IrqControl::new();
                irq_control.set_events(data);
                irq_control.update_mask(0x80 | mask);
                let expected = data & mask != 0;
                assert_eq!(expected, irq_control.is_triggered());
                assert_eq!(expected, irq_control.get_data().get_bit(7));
                assert_eq!(data, irq_control.get_data() & EVENT_MASK);
            }
        }
    }

    #[test]
    fn clear_events_leaves_other_flags() {
        for events in 0..0x80u8 {
            let mut irq_control = IrqControl::new();
            irq_control.set_events(0x7f);
            irq_control.clear_events(0x80 | events);
            assert_eq!(0x7f & !events, irq_control.get_raw_data());
        }
    }
}
