// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use q800_core::factory::Addressable;
use q800_core::io::mos6522::reg;
use q800_core::io::via1::port_b;

const REG_SHIFT: u32 = 9;

const CMD_READ: u8 = 0x80;
const CMD_SECONDS: [u8; 4] = [0x01, 0x05, 0x09, 0x0d];
const CMD_WRITE_PROTECT: u8 = 0x35;
const CMD_PRAM: u8 = 0x21;
const CMD_XPRAM: u8 = 0x38;

/// Guest side of the RTC serial protocol. Bit-bangs VIA1 port B through a
/// bus the way the ROM does, so transfers go through the same register
/// path as guest accesses.
pub struct RtcClient {
    base: u32,
}

impl RtcClient {
    /// `base` is the bus address of the VIA1 window.
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    fn reg_address(&self, reg: u8) -> u32 {
        self.base + (u32::from(reg) << REG_SHIFT)
    }

    fn read_reg(&self, bus: &mut dyn Addressable, reg: u8) -> u8 {
        bus.read(self.reg_address(reg))
    }

    fn write_reg(&self, bus: &mut dyn Addressable, reg: u8, value: u8) {
        bus.write(self.reg_address(reg), value);
    }

    fn set_port_b(&self, bus: &mut dyn Addressable, rtc_bits: u8) {
        let mask = port_b::RTC_DATA | port_b::RTC_CLK | port_b::RTC_ENB;
        let b = self.read_reg(bus, reg::B) & !mask;
        self.write_reg(bus, reg::B, b | (rtc_bits & mask));
    }

    /// Drives the RTC lines as outputs and asserts the active low enable.
    pub fn begin(&self, bus: &mut dyn Addressable) {
        let dirb = self.read_reg(bus, reg::DIRB);
        self.write_reg(
            bus,
            reg::DIRB,
            dirb | port_b::RTC_DATA | port_b::RTC_CLK | port_b::RTC_ENB,
        );
        self.set_port_b(bus, 0);
    }

    pub fn end(&self, bus: &mut dyn Addressable) {
        self.set_port_b(bus, port_b::RTC_ENB);
    }

    /// Shifts a byte out MSB first, latching each bit on the rising clock edge.
    pub fn send_byte(&self, bus: &mut dyn Addressable, value: u8) {
        for i in (0..8).rev() {
            let bit = (value >> i) & port_b::RTC_DATA;
            self.set_port_b(bus, bit);
            self.set_port_b(bus, bit | port_b::RTC_CLK);
        }
    }

    /// Turns the data line around and clocks a byte in MSB first. Each bit is
    /// valid after the falling clock edge.
    pub fn recv_byte(&self, bus: &mut dyn Addressable) -> u8 {
        let dirb = self.read_reg(bus, reg::DIRB);
        self.write_reg(bus, reg::DIRB, dirb & !port_b::RTC_DATA);
        let mut value = 0;
        for _ in 0..8 {
            self.set_port_b(bus, port_b::RTC_CLK);
            self.set_port_b(bus, 0);
            let b = self.read_reg(bus, reg::B);
            value = (value << 1) | (b & port_b::RTC_DATA);
        }
        self.write_reg(bus, reg::DIRB, dirb | port_b::RTC_DATA);
        value
    }

    fn transfer_in(&self, bus: &mut dyn Addressable, command: &[u8]) -> u8 {
        self.begin(bus);
        for byte in command {
            self.send_byte(bus, *byte);
        }
        let value = self.recv_byte(bus);
        self.end(bus);
        value
    }

    fn transfer_out(&self, bus: &mut dyn Addressable, command: &[u8]) {
        self.begin(bus);
        for byte in command {
            self.send_byte(bus, *byte);
        }
        self.end(bus);
    }

    /// Reads the 32-bit seconds counter, least significant byte first.
    pub fn read_seconds(&self, bus: &mut dyn Addressable) -> u32 {
        let mut seconds = 0u32;
        for (index, cmd) in CMD_SECONDS.iter().enumerate() {
            let byte = self.transfer_in(bus, &[*cmd | CMD_READ]);
            seconds |= u32::from(byte) << (index * 8);
        }
        seconds
    }

    pub fn read_pram_bank(&self, bus: &mut dyn Addressable, addr: u8) -> u8 {
        self.transfer_in(bus, &[CMD_PRAM | CMD_READ | ((addr & 0x03) << 2)])
    }

    pub fn write_pram_bank(&self, bus: &mut dyn Addressable, addr: u8, value: u8) {
        self.transfer_out(bus, &[CMD_PRAM | ((addr & 0x03) << 2), value]);
    }

    /// Extended parameter RAM access. `offset` selects one of 32 bytes
    /// inside the sector.
    pub fn read_xpram(&self, bus: &mut dyn Addressable, sector: u8, offset: u8) -> u8 {
        self.transfer_in(
            bus,
            &[CMD_XPRAM | CMD_READ | (sector & 0x07), (offset & 0x1f) << 2],
        )
    }

    pub fn write_xpram(&self, bus: &mut dyn Addressable, sector: u8, offset: u8, value: u8) {
        self.transfer_out(
            bus,
            &[CMD_XPRAM | (sector & 0x07), (offset & 0x1f) << 2, value],
        );
    }

    pub fn set_write_protect(&self, bus: &mut dyn Addressable, enabled: bool) {
        self.transfer_out(bus, &[CMD_WRITE_PROTECT, enabled as u8]);
    }
}
