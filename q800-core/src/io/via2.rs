// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::util::SharedCell;

use super::mos6522::{Registers, Variant};

// Spec: Guide to the Macintosh Family Hardware, 2nd Edition, VIA2

pub mod port_b {
    pub const POWER: u8 = 0x04;
}

/// External interrupt inputs of VIA2.
pub mod irq {
    pub const SCSI_DATA: usize = 0;
    pub const SLOT: usize = 1;
    pub const UNUSED: usize = 2;
    pub const SCSI: usize = 3;
    pub const ASC: usize = 4;
}

/// VIA2 carries the slot and SCSI interrupts and the soft power switch.
pub struct Via2 {
    shutdown_request: SharedCell<bool>,
}

impl Via2 {
    pub fn new(shutdown_request: SharedCell<bool>) -> Self {
        Self { shutdown_request }
    }
}

impl Variant for Via2 {
    const IRQ_LINES: usize = 8;

    fn get_name(&self) -> &'static str {
        "via2"
    }

    fn reset(&mut self, regs: &mut Registers) {
        regs.dirb = 0;
        regs.b = 0;
    }

    fn port_b_write(&mut self, regs: &mut Registers) {
        if regs.dirb & port_b::POWER != 0 && regs.b & port_b::POWER == 0 {
            info!(target: "system", "Shutdown requested");
            self.shutdown_request.set(true);
        }
    }
}
