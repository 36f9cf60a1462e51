// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use log::LogLevel;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::factory::Chip;
use crate::util::{IrqControl, IrqLine, Shared, VirtualClock};

use super::via_timer::{self, IntervalTimer, IntervalTimerState, RunMode};

// Spec: R6522 Versatile Interface Adapter Datasheet
// http://archive.6502.org/datasheets/rockwell_r6522_via.pdf

pub mod reg {
    pub const B: u8 = 0x00;
    pub const A: u8 = 0x01;
    pub const DIRB: u8 = 0x02;
    pub const DIRA: u8 = 0x03;
    pub const T1CL: u8 = 0x04;
    pub const T1CH: u8 = 0x05;
    pub const T1LL: u8 = 0x06;
    pub const T1LH: u8 = 0x07;
    pub const T2CL: u8 = 0x08;
    pub const T2CH: u8 = 0x09;
    pub const SR: u8 = 0x0a;
    pub const ACR: u8 = 0x0b;
    pub const PCR: u8 = 0x0c;
    pub const IFR: u8 = 0x0d;
    pub const IER: u8 = 0x0e;
    pub const ANH: u8 = 0x0f;
}

/// Interrupt flag masks of the 6522 internal sources.
pub mod int {
    pub const CA2: u8 = 0x01;
    pub const CA1: u8 = 0x02;
    pub const SR: u8 = 0x04;
    pub const CB2: u8 = 0x08;
    pub const CB1: u8 = 0x10;
    pub const T2: u8 = 0x20;
    pub const T1: u8 = 0x40;
}

pub const ACR_T1_MODE_MASK: u8 = 0xc0;
pub const ACR_T1_CONTINUOUS: u8 = 0x40;

/// Programmer visible register file. Board variants receive it in their
/// hooks and may rewrite port B, the shift register and the flags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub dira: u8,
    pub dirb: u8,
    pub sr: u8,
    pub acr: u8,
    pub pcr: u8,
    pub irq_control: IrqControl,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            a: 0,
            b: 0,
            dira: 0,
            dirb: 0xff,
            sr: 0,
            acr: 0,
            pcr: 0,
            irq_control: IrqControl::new(),
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mos6522State {
    pub regs: Registers,
    pub timer_1: IntervalTimerState,
    pub timer_2: IntervalTimerState,
}

/// Board specific behavior layered on top of the generic 6522.
pub trait Variant {
    /// Number of external interrupt inputs folded into the flag register.
    const IRQ_LINES: usize;
    fn get_name(&self) -> &'static str;
    /// Applies the board reset defaults after the generic register reset.
    fn reset(&mut self, regs: &mut Registers);
    /// Invoked after every host write to port B.
    fn port_b_write(&mut self, regs: &mut Registers);
}

pub struct Mos6522<V: Variant> {
    // Dependencies
    clock: Rc<VirtualClock>,
    variant: V,
    // Functional Units
    regs: Registers,
    timer_1: IntervalTimer,
    timer_2: IntervalTimer,
    // I/O
    irq_line: Shared<IrqLine>,
    irq_source: usize,
}

impl<V: Variant> Mos6522<V> {
    pub fn new(
        variant: V,
        frequency: u64,
        clock: Rc<VirtualClock>,
        irq_line: Shared<IrqLine>,
        irq_source: usize,
    ) -> Self {
        Self {
            clock,
            variant,
            regs: Registers::new(),
            timer_1: IntervalTimer::new(via_timer::Mode::Timer1, frequency),
            timer_2: IntervalTimer::new(via_timer::Mode::Timer2, frequency),
            irq_line,
            irq_source,
        }
    }

    pub fn get_registers(&self) -> &Registers {
        &self.regs
    }

    pub fn get_variant(&self) -> &V {
        &self.variant
    }

    pub fn get_variant_mut(&mut self) -> &mut V {
        &mut self.variant
    }

    pub fn is_irq_asserted(&self) -> bool {
        self.regs.irq_control.is_triggered()
    }

    /// Latches an interrupt flag bit and re-evaluates the summary output.
    pub fn raise_irq(&mut self, bit: usize) {
        self.regs.irq_control.set_event(bit);
        self.update_irq();
    }

    /// Level-triggered external interrupt input. Lines beyond the variant
    /// fan-in width are ignored.
    pub fn set_irq_input(&mut self, line: usize, level: bool) {
        if line >= V::IRQ_LINES {
            warn!(
                target: "via::irq",
                "{} ignoring irq input {}",
                self.variant.get_name(),
                line
            );
            return;
        }
        if level {
            self.regs.irq_control.set_event(line);
        } else {
            self.regs.irq_control.clear_event(line);
        }
        self.update_irq();
    }

    /// Runs `f` against the variant with access to the register file.
    pub fn update_variant<F>(&mut self, f: F)
    where
        F: FnOnce(&mut V, &mut Registers),
    {
        f(&mut self.variant, &mut self.regs);
        self.update_irq();
    }

    fn t1_run_mode(&self) -> RunMode {
        if self.regs.acr & ACR_T1_MODE_MASK == ACR_T1_CONTINUOUS {
            RunMode::Continuous
        } else {
            RunMode::OneShot
        }
    }

    fn timer1_update(&mut self, now: u64) {
        let armed = self.regs.irq_control.get_raw_mask() & int::T1 != 0
            && (self.t1_run_mode() == RunMode::Continuous || self.timer_1.is_running());
        self.timer_1.update(now, armed);
    }

    fn timer2_update(&mut self, now: u64) {
        let armed =
            self.regs.irq_control.get_raw_mask() & int::T2 != 0 && self.timer_2.is_running();
        self.timer_2.update(now, armed);
    }

    fn update_irq(&mut self) {
        let level = self.regs.irq_control.is_triggered();
        self.irq_line
            .borrow_mut()
            .set_low(self.irq_source, level);
    }

    // -- State

    pub fn get_state(&self) -> Mos6522State {
        Mos6522State {
            regs: self.regs,
            timer_1: self.timer_1.get_state(),
            timer_2: self.timer_2.get_state(),
        }
    }

    pub fn set_state(&mut self, state: &Mos6522State) {
        self.regs = state.regs;
        self.timer_1.set_state(&state.timer_1);
        self.timer_2.set_state(&state.timer_2);
        self.update_irq();
    }
}

impl<V: Variant> Chip for Mos6522<V> {
    fn next_deadline(&self) -> Option<u64> {
        match (self.timer_1.get_deadline(), self.timer_2.get_deadline()) {
            (Some(t1), Some(t2)) => Some(t1.min(t2)),
            (t1, t2) => t1.or(t2),
        }
    }

    fn process_timers(&mut self) {
        let now = self.clock.now_ns();
        if self.timer_1.is_due(now) {
            let run_mode = self.t1_run_mode();
            self.timer_1.expire(run_mode);
            self.regs.irq_control.set_events(int::T1);
            self.timer1_update(now);
            self.update_irq();
        }
        if self.timer_2.is_due(now) {
            self.timer_2.expire(RunMode::OneShot);
            self.regs.irq_control.set_events(int::T2);
            self.timer2_update(now);
            self.update_irq();
        }
    }

    fn reset(&mut self) {
        /*
        A low on RES clears all internal registers except the timer counters
        and latches and the shift register. Port lines become inputs.
        */
        let now = self.clock.now_ns();
        self.regs = Registers::new();
        self.timer_1.reset(now);
        self.timer_2.reset(now);
        self.variant.reset(&mut self.regs);
        self.update_irq();
    }

    // I/O

    fn read(&mut self, reg: u8) -> u8 {
        let now = self.clock.now_ns();
        let value = match reg {
            reg::B => self.regs.b,
            reg::A | reg::ANH => self.regs.a,
            reg::DIRB => self.regs.dirb,
            reg::DIRA => self.regs.dira,
            reg::T1CL => {
                self.regs.irq_control.clear_events(int::T1);
                self.update_irq();
                (self.timer_1.get_counter(now) & 0xff) as u8
            }
            reg::T1CH => (self.timer_1.get_counter(now) >> 8) as u8,
            reg::T1LL => (self.timer_1.get_latch() & 0xff) as u8,
            reg::T1LH => (self.timer_1.get_latch() >> 8) as u8,
            reg::T2CL => {
                self.regs.irq_control.clear_events(int::T2);
                self.update_irq();
                (self.timer_2.get_counter(now) & 0xff) as u8
            }
            reg::T2CH => (self.timer_2.get_counter(now) >> 8) as u8,
            reg::SR => {
                self.regs.irq_control.clear_events(int::SR);
                self.update_irq();
                self.regs.sr
            }
            reg::ACR => self.regs.acr,
            reg::PCR => self.regs.pcr,
            reg::IFR => self.regs.irq_control.get_data(),
            reg::IER => self.regs.irq_control.get_mask(),
            _ => {
                debug!(target: "via::reg", "Read unmapped reg 0x{:02x}", reg);
                0
            }
        };
        if log_enabled!(target: "via::reg", LogLevel::Trace) {
            trace!(
                target: "via::reg",
                "{} read 0x{:02x} = 0x{:02x}",
                self.variant.get_name(),
                reg,
                value
            );
        }
        value
    }

    fn write(&mut self, reg: u8, value: u8) {
        if log_enabled!(target: "via::reg", LogLevel::Trace) {
            trace!(
                target: "via::reg",
                "{} write 0x{:02x} = 0x{:02x}",
                self.variant.get_name(),
                reg,
                value
            );
        }
        let now = self.clock.now_ns();
        match reg {
            reg::B => {
                self.regs.b = (self.regs.b & !self.regs.dirb) | (value & self.regs.dirb);
                self.variant.port_b_write(&mut self.regs);
                self.update_irq();
            }
            reg::A | reg::ANH => {
                self.regs.a = (self.regs.a & !self.regs.dira) | (value & self.regs.dira);
            }
            reg::DIRB => self.regs.dirb = value,
            reg::DIRA => self.regs.dira = value,
            reg::T1CL | reg::T1LL => {
                self.timer_1.set_latch_lo(value);
                self.timer1_update(now);
            }
            reg::T1CH => {
                self.timer_1.set_latch_hi(value);
                self.regs.irq_control.clear_events(int::T1);
                let latch = self.timer_1.get_latch();
                self.timer_1.load(now, latch);
                self.timer1_update(now);
                self.update_irq();
            }
            reg::T1LH => {
                self.timer_1.set_latch_hi(value);
                self.regs.irq_control.clear_events(int::T1);
                self.timer1_update(now);
                self.update_irq();
            }
            reg::T2CL => self.timer_2.set_latch_lo(value),
            reg::T2CH => {
                self.timer_2.set_latch_hi(value);
                self.regs.irq_control.clear_events(int::T2);
                let latch = self.timer_2.get_latch();
                self.timer_2.load(now, latch);
                self.timer2_update(now);
                self.update_irq();
            }
            reg::SR => self.regs.sr = value,
            reg::ACR => {
                self.regs.acr = value;
                self.timer1_update(now);
            }
            reg::PCR => self.regs.pcr = value,
            reg::IFR => {
                self.regs.irq_control.clear_events(value);
                self.update_irq();
            }
            reg::IER => {
                self.regs.irq_control.update_mask(value);
                self.update_irq();
                self.timer1_update(now);
                self.timer2_update(now);
            }
            _ => debug!(target: "via::reg", "Write unmapped reg 0x{:02x}", reg),
        }
    }
}
