// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use log::LogLevel;

use crate::factory::AdbBus;
use crate::util::Shared;

use super::mos6522::{Registers, Variant};
use super::rtc::{Rtc, RTC_CLK, RTC_DATA, RTC_ENB};

// Spec: Guide to the Macintosh Family Hardware, 2nd Edition, VIA1

pub mod port_b {
    pub const RTC_DATA: u8 = super::RTC_DATA;
    pub const RTC_CLK: u8 = super::RTC_CLK;
    pub const RTC_ENB: u8 = super::RTC_ENB;
    pub const ADB_INT: u8 = 0x08;
    pub const ADB_S1: u8 = 0x10;
    pub const ADB_S2: u8 = 0x20;
    pub const ADB_STATE_MASK: u8 = ADB_S1 | ADB_S2;
    pub const ADB_STATE_SHIFT: u8 = 4;
}

/// External interrupt inputs of VIA1.
pub mod irq {
    pub const ONE_SECOND: usize = 0;
    pub const VBLANK: usize = 1;
    pub const ADB_READY: usize = 2;
    pub const ADB_DATA: usize = 3;
    pub const ADB_CLOCK: usize = 4;
}

pub const ACR_SHIFT_OUT: u8 = 0x10;

/// VIA1 multiplexes the RTC serial lines and the ADB transceiver on port B.
pub struct Via1 {
    adb: Shared<dyn AdbBus>,
    rtc: Rtc,
}

impl Via1 {
    pub fn new(rtc: Rtc, adb: Shared<dyn AdbBus>) -> Self {
        Self { adb, rtc }
    }

    pub fn get_rtc(&self) -> &Rtc {
        &self.rtc
    }

    pub fn get_rtc_mut(&mut self) -> &mut Rtc {
        &mut self.rtc
    }

    fn adb_state(regs: &Registers) -> u8 {
        (regs.b & port_b::ADB_STATE_MASK) >> port_b::ADB_STATE_SHIFT
    }

    fn adb_update(&mut self, regs: &mut Registers) {
        let state = Self::adb_state(regs);
        let mut adb = self.adb.borrow_mut();
        let ready = if regs.acr & ACR_SHIFT_OUT != 0 {
            let result = adb.send(state, regs.sr);
            if log_enabled!(target: "via::adb", LogLevel::Trace) {
                trace!(target: "via::adb", "Send 0x{:02x} state {} = {}", regs.sr, state, result);
            }
            result <= 0
        } else {
            let result = adb.receive(state, &mut regs.sr);
            if log_enabled!(target: "via::adb", LogLevel::Trace) {
                trace!(target: "via::adb", "Receive 0x{:02x} state {} = {}", regs.sr, state, result);
            }
            result <= 0 || regs.sr == 0xff
        };
        // the interrupt line is active low
        if ready {
            regs.b |= port_b::ADB_INT;
        } else {
            regs.b &= !port_b::ADB_INT;
        }
        if adb.take_data_ready() {
            regs.irq_control.set_event(irq::ADB_READY);
        }
    }

    /// Lets the bus push unsolicited device data while the transceiver is idle.
    pub fn adb_poll(&mut self, regs: &mut Registers) {
        let mut adb = self.adb.borrow_mut();
        if regs.b & port_b::ADB_INT != 0 {
            let state = Self::adb_state(regs);
            if adb.poll(state, &mut regs.sr) {
                debug!(target: "via::adb", "Poll data 0x{:02x}", regs.sr);
                regs.b &= !port_b::ADB_INT;
            }
        }
        if adb.take_data_ready() {
            regs.irq_control.set_event(irq::ADB_READY);
        }
    }
}

impl Variant for Via1 {
    const IRQ_LINES: usize = 8;

    fn get_name(&self) -> &'static str {
        "via1"
    }

    fn reset(&mut self, regs: &mut Registers) {
        regs.b = port_b::ADB_STATE_MASK | port_b::ADB_INT | port_b::RTC_ENB;
    }

    fn port_b_write(&mut self, regs: &mut Registers) {
        regs.b = self.rtc.update(regs.b, regs.dirb);
        self.adb_update(regs);
        self.rtc.set_last_port_b(regs.b);
    }
}
