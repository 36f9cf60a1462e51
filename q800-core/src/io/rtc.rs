// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use bit_field::BitField;
use byteorder::{ByteOrder, LittleEndian};
use log::LogLevel;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::VirtualClock;

// Spec: Guide to the Macintosh Family Hardware, 2nd Edition, Real-Time Clock
// Spec: Inside Macintosh Volume III, Parameter RAM

pub const PRAM_SIZE: usize = 256;
/// Seconds between the Mac epoch (1904-01-01) and the Unix epoch.
pub const RTC_OFFSET: u32 = 2_082_844_800;

pub const RTC_DATA: u8 = 0x01;
pub const RTC_CLK: u8 = 0x02;
pub const RTC_ENB: u8 = 0x04;

const CMD_READ: u8 = 0x80;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Command {
    Seconds(usize),
    TestRegister,
    WriteProtect,
    PramBank { addr_mask: u8 },
    Extended,
}

struct Rule {
    name: &'static str,
    mask: u8,
    pattern: u8,
    command: Command,
}

impl Rule {
    fn matches(&self, byte: u8) -> bool {
        byte & self.mask == self.pattern
    }
}

/*
Command decoding is an ordered rule list matched against the command byte with
the read bit forced on, so a write command finds the same rule as its read twin.
The first match wins. Both PRAM bank rules share a pattern, which leaves the
16-entry bank unreachable behind the 4-entry one.
*/
#[rustfmt::skip]
const RULES: [Rule; 9] = [
    Rule { name: "seconds 0", mask: 0xff, pattern: 0x81, command: Command::Seconds(0) },
    Rule { name: "seconds 1", mask: 0xff, pattern: 0x85, command: Command::Seconds(1) },
    Rule { name: "seconds 2", mask: 0xff, pattern: 0x89, command: Command::Seconds(2) },
    Rule { name: "seconds 3", mask: 0xff, pattern: 0x8d, command: Command::Seconds(3) },
    Rule { name: "test", mask: 0xff, pattern: 0xb1, command: Command::TestRegister },
    Rule { name: "write protect", mask: 0xff, pattern: 0xb5, command: Command::WriteProtect },
    Rule { name: "pram 4", mask: 0xf3, pattern: 0xa1, command: Command::PramBank { addr_mask: 0x03 } },
    Rule { name: "pram 16", mask: 0xf3, pattern: 0xa1, command: Command::PramBank { addr_mask: 0x0f } },
    Rule { name: "extended", mask: 0xf8, pattern: 0xb8, command: Command::Extended },
];

fn decode(byte: u8) -> Option<&'static Rule> {
    let key = byte | CMD_READ;
    RULES.iter().find(|rule| rule.matches(key))
}

fn extended_index(cmd: u8, addr: u8) -> usize {
    let sector = (cmd & 0x07) as usize;
    sector * 8 + ((addr >> 2) & 0x1f) as usize
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RtcState {
    pub cmd: u8,
    pub alt: Option<u8>,
    pub wprotect: bool,
    pub data_in: u8,
    pub data_in_cnt: u8,
    pub data_out: u8,
    pub data_out_cnt: u8,
    pub last_b: u8,
    pub tick_offset: u32,
    pub pram: Vec<u8>,
}

/// Bit-serial RTC and parameter RAM hanging off VIA1 port B.
pub struct Rtc {
    // Dependencies
    clock: Rc<VirtualClock>,
    // Runtime State
    cmd: u8,
    alt: Option<u8>,
    wprotect: bool,
    data_in: u8,
    data_in_cnt: u8,
    data_out: u8,
    data_out_cnt: u8,
    last_b: u8,
    tick_offset: u32,
    pram: [u8; PRAM_SIZE],
}

impl Rtc {
    pub fn new(clock: Rc<VirtualClock>, tick_offset: u32) -> Self {
        Self {
            clock,
            cmd: 0,
            alt: None,
            wprotect: false,
            data_in: 0,
            data_in_cnt: 0,
            data_out: 0,
            data_out_cnt: 0,
            last_b: 0,
            tick_offset,
            pram: [0; PRAM_SIZE],
        }
    }

    /// Seeds the seconds register from a host Unix time.
    pub fn from_unix_time(clock: Rc<VirtualClock>, unix_secs: u64) -> Self {
        Self::new(clock, (unix_secs as u32).wrapping_add(RTC_OFFSET))
    }

    pub fn get_last_port_b(&self) -> u8 {
        self.last_b
    }

    /// Value of the seconds register: Mac epoch seconds at the current virtual time.
    pub fn get_seconds(&self) -> u32 {
        self.tick_offset
            .wrapping_add(self.clock.now_secs() as u32)
    }

    pub fn get_tick_offset(&self) -> u32 {
        self.tick_offset
    }

    pub fn is_write_protected(&self) -> bool {
        self.wprotect
    }

    pub fn load_pram(&mut self, image: &[u8]) -> Result<(), String> {
        if image.len() != PRAM_SIZE {
            return Err(format!(
                "invalid pram image size {}, expected {}",
                image.len(),
                PRAM_SIZE
            ));
        }
        self.pram.copy_from_slice(image);
        Ok(())
    }

    pub fn pram(&self) -> &[u8] {
        &self.pram
    }

    pub fn set_last_port_b(&mut self, value: u8) {
        self.last_b = value;
    }

    pub fn set_tick_offset(&mut self, tick_offset: u32) {
        self.tick_offset = tick_offset;
    }

    /// Clocks the serial interface with the new port B value and returns
    /// port B as driven by the chip. The caller latches the final port B
    /// value with `set_last_port_b` once all port B consumers have run.
    pub fn update(&mut self, port_b: u8, dir_b: u8) -> u8 {
        let mut b = port_b;
        if b & RTC_ENB != 0 {
            return b;
        }
        let rising = self.last_b & RTC_CLK == 0 && b & RTC_CLK != 0;
        let falling = self.last_b & RTC_CLK != 0 && b & RTC_CLK == 0;
        if dir_b & RTC_DATA != 0 {
            if rising {
                self.data_out = (self.data_out << 1) | (b & RTC_DATA);
                self.data_out_cnt += 1;
            }
        } else if falling && self.data_in_cnt > 0 {
            b.set_bit(0, self.data_in.get_bit(7));
            self.data_in <<= 1;
            self.data_in_cnt -= 1;
        }
        if self.data_out_cnt == 8 {
            self.data_out_cnt = 0;
            let byte = self.data_out;
            self.dispatch(byte);
            self.data_out = 0;
        }
        b
    }

    fn dispatch(&mut self, byte: u8) {
        if self.cmd == 0 {
            if byte & CMD_READ != 0 {
                self.begin_read(byte);
            } else {
                self.cmd = byte;
            }
        } else if self.cmd & CMD_READ != 0 {
            let index = extended_index(self.cmd, byte);
            let value = self.pram[index];
            self.respond(value);
            self.cmd = 0;
        } else {
            self.complete_write(byte);
        }
    }

    fn begin_read(&mut self, byte: u8) {
        let rule = match decode(byte) {
            Some(rule) => rule,
            None => {
                debug!(target: "via::rtc", "Ignored read command 0x{:02x}", byte);
                return;
            }
        };
        if log_enabled!(target: "via::rtc", LogLevel::Trace) {
            trace!(target: "via::rtc", "Read command 0x{:02x} {}", byte, rule.name);
        }
        match rule.command {
            Command::Seconds(index) => {
                let mut seconds = [0u8; 4];
                LittleEndian::write_u32(&mut seconds, self.get_seconds());
                self.respond(seconds[index]);
            }
            Command::PramBank { addr_mask } => {
                let value = self.pram[((byte >> 2) & addr_mask) as usize];
                self.respond(value);
            }
            Command::Extended => self.cmd = byte,
            Command::TestRegister | Command::WriteProtect => {
                debug!(target: "via::rtc", "Ignored read of {} register", rule.name);
            }
        }
    }

    fn complete_write(&mut self, data: u8) {
        let cmd = self.cmd;
        if let Some(addr) = self.alt.take() {
            let index = extended_index(cmd, addr);
            self.write_pram(index, data);
            self.cmd = 0;
            return;
        }
        match decode(cmd).map(|rule| rule.command) {
            Some(Command::Seconds(index)) => {
                debug!(target: "via::rtc", "Ignored write of seconds register {}", index);
            }
            Some(Command::TestRegister) => {}
            Some(Command::WriteProtect) => {
                self.wprotect = data.get_bit(0);
                info!(
                    target: "via::rtc",
                    "Write protect {}",
                    if self.wprotect { "on" } else { "off" }
                );
            }
            Some(Command::PramBank { addr_mask }) => {
                let index = ((cmd >> 2) & addr_mask) as usize;
                self.write_pram(index, data);
            }
            Some(Command::Extended) => {
                // the data byte carries the sector address, the value follows
                self.alt = Some(data);
                return;
            }
            None => {
                debug!(target: "via::rtc", "Ignored write command 0x{:02x}", cmd);
            }
        }
        self.cmd = 0;
    }

    fn respond(&mut self, value: u8) {
        self.data_in = value;
        self.data_in_cnt = 8;
    }

    fn write_pram(&mut self, index: usize, value: u8) {
        if self.wprotect {
            debug!(target: "via::rtc", "Write protected pram 0x{:02x}", index);
            return;
        }
        if log_enabled!(target: "via::rtc", LogLevel::Debug) {
            debug!(target: "via::rtc", "Write pram 0x{:02x} = 0x{:02x}", index, value);
        }
        self.pram[index] = value;
    }

    // -- State

    pub fn get_state(&self) -> RtcState {
        RtcState {
            cmd: self.cmd,
            alt: self.alt,
            wprotect: self.wprotect,
            data_in: self.data_in,
            data_in_cnt: self.data_in_cnt,
            data_out: self.data_out,
            data_out_cnt: self.data_out_cnt,
            last_b: self.last_b,
            tick_offset: self.tick_offset,
            pram: self.pram.to_vec(),
        }
    }

    /// Restores a saved state. Nothing changes unless the whole state is valid.
    pub fn set_state(&mut self, state: &RtcState) -> Result<(), String> {
        if state.pram.len() != PRAM_SIZE {
            return Err(format!(
                "invalid pram image size {}, expected {}",
                state.pram.len(),
                PRAM_SIZE
            ));
        }
        if state.data_in_cnt > 8 || state.data_out_cnt > 8 {
            return Err(format!(
                "invalid rtc bit counts {}/{}",
                state.data_in_cnt, state.data_out_cnt
            ));
        }
        self.load_pram(&state.pram)?;
        self.cmd = state.cmd;
        self.alt = state.alt;
        self.wprotect = state.wprotect;
        self.data_in = state.data_in;
        self.data_in_cnt = state.data_in_cnt;
        self.data_out = state.data_out;
        self.data_out_cnt = state.data_out_cnt;
        self.last_b = state.last_b;
        self.tick_offset = state.tick_offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::NANOS_PER_SEC;

    fn setup_rtc() -> (Rtc, Rc<VirtualClock>) {
        let clock = Rc::new(VirtualClock::new());
        let rtc = Rtc::new(clock.clone(), 0x1234_5678);
        (rtc, clock)
    }

    fn clock_b(rtc: &mut Rtc, b: u8, dir_b: u8) -> u8 {
        let result = rtc.update(b, dir_b);
        rtc.set_last_port_b(result);
        result
    }

    fn send_byte(rtc: &mut Rtc, value: u8) {
        for i in (0..8).rev() {
            let bit = (value >> i) & RTC_DATA;
            clock_b(rtc, bit, 0xff);
            clock_b(rtc, bit | RTC_CLK, 0xff);
        }
    }

    fn recv_byte(rtc: &mut Rtc) -> u8 {
        let mut value = 0;
        for _ in 0..8 {
            clock_b(rtc, RTC_CLK, 0xfe);
            let b = clock_b(rtc, 0, 0xfe);
            value = (value << 1) | (b & RTC_DATA);
        }
        value
    }

    #[test]
    fn bits_assemble_into_command() {
        for byte in 0..0x80u8 {
            let (mut rtc, _) = setup_rtc();
            for i in (1..8).rev() {
                let bit = (byte >> i) & RTC_DATA;
                clock_b(&mut rtc, bit, 0xff);
                clock_b(&mut rtc, bit | RTC_CLK, 0xff);
            }
            assert_eq!(byte >> 1, rtc.get_state().data_out);
            assert_eq!(7, rtc.get_state().data_out_cnt);
            let bit = byte & RTC_DATA;
            clock_b(&mut rtc, bit, 0xff);
            clock_b(&mut rtc, bit | RTC_CLK, 0xff);
            assert_eq!(byte, rtc.get_state().cmd);
            assert_eq!(0, rtc.get_state().data_out_cnt);
            assert_eq!(0, rtc.get_state().data_out);
        }
    }

    #[test]
    fn enable_deasserted_ignores_clock() {
        let (mut rtc, _) = setup_rtc();
        for _ in 0..8 {
            clock_b(&mut rtc, RTC_ENB | 1, 0xff);
            clock_b(&mut rtc, RTC_ENB | 1 | RTC_CLK, 0xff);
        }
        assert_eq!(0, rtc.get_state().data_out_cnt);
        assert_eq!(0, rtc.get_state().cmd);
    }

    #[test]
    fn read_seconds_little_endian() {
        let (mut rtc, clock) = setup_rtc();
        clock.advance(3 * NANOS_PER_SEC);
        let mut seconds = 0u32;
        for (index, cmd) in [0x81u8, 0x85, 0x89, 0x8d].iter().enumerate() {
            send_byte(&mut rtc, *cmd);
            seconds |= u32::from(recv_byte(&mut rtc)) << (index * 8);
        }
        assert_eq!(0x1234_567b, seconds);
    }

    #[test]
    fn write_and_read_pram_bank() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x21 | (2 << 2));
        send_byte(&mut rtc, 0x42);
        assert_eq!(0x42, rtc.pram()[2]);
        send_byte(&mut rtc, 0xa1 | (2 << 2));
        assert_eq!(0x42, recv_byte(&mut rtc));
        assert_eq!(0, rtc.get_state().cmd);
    }

    #[test]
    fn pram_bank_uses_two_bit_address() {
        let (mut rtc, _) = setup_rtc();
        // address bits 4 and 5 are part of the pattern, so only bits 2-3 select
        send_byte(&mut rtc, 0x21 | (3 << 2));
        send_byte(&mut rtc, 0x99);
        assert_eq!(0x99, rtc.pram()[3]);
        assert_eq!(0x00, rtc.pram()[0x0b]);
    }

    #[test]
    fn extended_write_and_read() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x38 | 0x01);
        send_byte(&mut rtc, 0x05 << 2);
        send_byte(&mut rtc, 0x5a);
        assert_eq!(0x5a, rtc.pram()[8 + 5]);
        send_byte(&mut rtc, 0xb8 | 0x01);
        send_byte(&mut rtc, 0x05 << 2);
        assert_eq!(0x5a, recv_byte(&mut rtc));
        assert_eq!(0, rtc.get_state().cmd);
    }

    #[test]
    fn extended_address_zero() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x38);
        send_byte(&mut rtc, 0x00);
        send_byte(&mut rtc, 0x77);
        assert_eq!(0x77, rtc.pram()[0]);
    }

    #[test]
    fn write_protect_blocks_pram_writes() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x35);
        send_byte(&mut rtc, 0x01);
        assert_eq!(true, rtc.is_write_protected());
        send_byte(&mut rtc, 0x21);
        send_byte(&mut rtc, 0x42);
        assert_eq!(0x00, rtc.pram()[0]);
        send_byte(&mut rtc, 0x35);
        send_byte(&mut rtc, 0x00);
        assert_eq!(false, rtc.is_write_protected());
        send_byte(&mut rtc, 0x21);
        send_byte(&mut rtc, 0x42);
        assert_eq!(0x42, rtc.pram()[0]);
    }

    #[test]
    fn seconds_and_test_writes_are_ignored() {
        let (mut rtc, _) = setup_rtc();
        let pram = rtc.pram().to_vec();
        for cmd in [0x01u8, 0x05, 0x09, 0x0d, 0x31, 0x7f].iter() {
            send_byte(&mut rtc, *cmd);
            send_byte(&mut rtc, 0xff);
            assert_eq!(0, rtc.get_state().cmd);
        }
        assert_eq!(0x1234_5678, rtc.get_seconds());
        assert_eq!(pram, rtc.pram().to_vec());
    }

    #[test]
    fn unknown_read_is_ignored() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x83);
        assert_eq!(0, rtc.get_state().data_in_cnt);
        assert_eq!(0, rtc.get_state().cmd);
    }

    #[test]
    fn rules_keep_sixteen_entry_bank_shadowed() {
        let bank = RULES
            .iter()
            .filter(|rule| rule.pattern == 0xa1)
            .collect::<Vec<_>>();
        assert_eq!(2, bank.len());
        for byte in 0..=255u8 {
            if let Some(rule) = decode(byte) {
                assert_ne!("pram 16", rule.name);
            }
        }
    }

    #[test]
    fn load_pram_rejects_bad_size() {
        let (mut rtc, _) = setup_rtc();
        assert!(rtc.load_pram(&[0u8; 16]).is_err());
        let mut image = [0u8; PRAM_SIZE];
        image[0x10] = 0xa8;
        rtc.load_pram(&image).unwrap();
        assert_eq!(0xa8, rtc.pram()[0x10]);
    }

    #[test]
    fn state_round_trip() {
        let (mut rtc, clock) = setup_rtc();
        send_byte(&mut rtc, 0x38);
        let state = rtc.get_state();
        let mut other = Rtc::new(clock, 0);
        other.set_state(&state).unwrap();
        assert_eq!(state, other.get_state());
    }

    #[test]
    fn rejected_state_changes_nothing() {
        let (mut rtc, _) = setup_rtc();
        send_byte(&mut rtc, 0x21 | (1 << 2));
        send_byte(&mut rtc, 0x42);
        let before = rtc.get_state();
        let mut bad = before.clone();
        bad.pram[7] = 0xee;
        bad.tick_offset = 0;
        bad.data_out_cnt = 9;
        assert!(rtc.set_state(&bad).is_err());
        assert_eq!(before, rtc.get_state());
        assert_eq!(0x00, rtc.pram()[7]);
        let mut short = before.clone();
        short.pram.truncate(16);
        short.wprotect = true;
        assert!(rtc.set_state(&short).is_err());
        assert_eq!(before, rtc.get_state());
    }
}
