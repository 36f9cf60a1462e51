// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use log::LogLevel;
use q800_core::factory::{Addressable, AdbBus, Chip};
use q800_core::io::mos6522::{Mos6522, Mos6522State};
use q800_core::io::rtc::{Rtc, RtcState};
use q800_core::io::via1::{self, Via1};
use q800_core::io::via2::Via2;
use q800_core::util::{
    next_grid_deadline, IrqLine, Shared, SharedCell, Timer, VirtualClock, WeakShared,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ViaConfig;

/// Size of each VIA's window. Registers repeat every 512 bytes inside it.
pub const VIA_SIZE: u32 = 0x2000;

const REG_SHIFT: u32 = 9;
const VIA1_IRQ_SOURCE: usize = 0;
const VIA2_IRQ_SOURCE: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViaId {
    Via1,
    Via2,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ViaSnapshot {
    pub time_ns: u64,
    pub via_1: Mos6522State,
    pub via_2: Mos6522State,
    pub rtc: RtcState,
    pub vbl: Timer,
    pub one_second: Timer,
    pub adb_poll: Timer,
}

// Design:
//   MacVia is the pair of VIAs as the board sees them: one 16 KiB window, the
//   board-level periodic timers that feed VIA1 and the summary outputs routed
//   to the CPU interrupt line. Everything runs against the shared virtual clock.

pub struct MacVia {
    // Dependencies
    clock: Rc<VirtualClock>,
    adb_bus: Shared<dyn AdbBus>,
    // Chipset
    via_1: Mos6522<Via1>,
    via_2: Mos6522<Via2>,
    // Periodic Timers
    vbl: Timer,
    vbl_period: u64,
    one_second: Timer,
    one_second_period: u64,
    adb_poll: Timer,
    adb_poll_period: u64,
}

impl MacVia {
    pub fn new(
        config: &ViaConfig,
        clock: Rc<VirtualClock>,
        rtc: Rtc,
        adb_bus: Shared<dyn AdbBus>,
        irq_line: Shared<IrqLine>,
        shutdown_request: SharedCell<bool>,
    ) -> Result<Self, String> {
        config.validate()?;
        let via_1 = Mos6522::new(
            Via1::new(rtc, adb_bus.clone()),
            config.timer_freq,
            clock.clone(),
            irq_line.clone(),
            VIA1_IRQ_SOURCE,
        );
        let via_2 = Mos6522::new(
            Via2::new(shutdown_request),
            config.timer_freq,
            clock.clone(),
            irq_line,
            VIA2_IRQ_SOURCE,
        );
        Ok(Self {
            clock,
            adb_bus,
            via_1,
            via_2,
            vbl: Timer::new(),
            vbl_period: config.vbl_period_ns,
            one_second: Timer::new(),
            one_second_period: config.one_second_period_ns,
            adb_poll: Timer::new(),
            adb_poll_period: config.adb_poll_period_ns(),
        })
    }

    pub fn get_rtc(&self) -> &Rtc {
        self.via_1.get_variant().get_rtc()
    }

    pub fn get_rtc_mut(&mut self) -> &mut Rtc {
        self.via_1.get_variant_mut().get_rtc_mut()
    }

    pub fn get_via_1(&self) -> &Mos6522<Via1> {
        &self.via_1
    }

    pub fn get_via_1_mut(&mut self) -> &mut Mos6522<Via1> {
        &mut self.via_1
    }

    pub fn get_via_2(&self) -> &Mos6522<Via2> {
        &self.via_2
    }

    pub fn get_via_2_mut(&mut self) -> &mut Mos6522<Via2> {
        &mut self.via_2
    }

    /// Returns an input line that drives `line` of the given VIA's interrupt
    /// fan-in. The line holds a weak reference and goes quiet once the VIA
    /// pair is dropped.
    pub fn irq_input(this: &Shared<MacVia>, id: ViaId, line: usize) -> IrqInput {
        IrqInput {
            via: Rc::downgrade(this),
            id,
            line,
        }
    }

    pub fn reset(&mut self) {
        info!(target: "via", "Resetting");
        self.via_1.reset();
        self.via_2.reset();
        self.adb_bus.borrow_mut().reset();
        let now = self.clock.now_ns();
        self.vbl.arm(next_grid_deadline(now, self.vbl_period));
        self.one_second.arm(next_grid_deadline(now, self.one_second_period));
        self.adb_poll.arm(next_grid_deadline(now, self.adb_poll_period));
    }

    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.vbl.get_deadline(),
            self.one_second.get_deadline(),
            self.adb_poll.get_deadline(),
            self.via_1.next_deadline(),
            self.via_2.next_deadline(),
        ]
        .iter()
        .filter_map(|deadline| *deadline)
        .min()
    }

    /// Fires every timer whose deadline has passed. A timer that is late by
    /// several periods fires once and resumes on the grid after `now`.
    pub fn process_timers(&mut self) {
        let now = self.clock.now_ns();
        if self.vbl.take_due(now) {
            if log_enabled!(target: "via::timer", LogLevel::Trace) {
                trace!(target: "via::timer", "VBL at {}", now);
            }
            self.via_1.raise_irq(via1::irq::VBLANK);
            self.vbl.arm(next_grid_deadline(now, self.vbl_period));
        }
        if self.one_second.take_due(now) {
            if log_enabled!(target: "via::timer", LogLevel::Trace) {
                trace!(target: "via::timer", "One second at {}", now);
            }
            self.via_1.raise_irq(via1::irq::ONE_SECOND);
            self.one_second.arm(next_grid_deadline(now, self.one_second_period));
        }
        if self.adb_poll.take_due(now) {
            self.via_1.update_variant(|via, regs| via.adb_poll(regs));
            self.adb_poll.arm(next_grid_deadline(now, self.adb_poll_period));
        }
        self.via_1.process_timers();
        self.via_2.process_timers();
    }

    // -- Interrupt Inputs

    pub fn set_irq(&mut self, id: ViaId, line: usize, level: bool) {
        match id {
            ViaId::Via1 => self.via_1.set_irq_input(line, level),
            ViaId::Via2 => self.via_2.set_irq_input(line, level),
        }
    }

    pub fn set_via1_irq(&mut self, line: usize, level: bool) {
        self.set_irq(ViaId::Via1, line, level);
    }

    pub fn set_via2_irq(&mut self, line: usize, level: bool) {
        self.set_irq(ViaId::Via2, line, level);
    }

    // -- State

    pub fn snapshot(&self) -> ViaSnapshot {
        ViaSnapshot {
            time_ns: self.clock.now_ns(),
            via_1: self.via_1.get_state(),
            via_2: self.via_2.get_state(),
            rtc: self.get_rtc().get_state(),
            vbl: self.vbl,
            one_second: self.one_second,
            adb_poll: self.adb_poll,
        }
    }

    pub fn restore(&mut self, snapshot: &ViaSnapshot) -> Result<(), String> {
        self.get_rtc_mut().set_state(&snapshot.rtc)?;
        self.clock.set_now(snapshot.time_ns);
        self.via_1.set_state(&snapshot.via_1);
        self.via_2.set_state(&snapshot.via_2);
        self.vbl = snapshot.vbl;
        self.one_second = snapshot.one_second;
        self.adb_poll = snapshot.adb_poll;
        info!(target: "via", "Restored state at {} ns", snapshot.time_ns);
        Ok(())
    }
}

/// Offsets are relative to the start of the VIA1 window; VIA2 follows at
/// `VIA_SIZE`.
impl Addressable for MacVia {
    fn read(&mut self, address: u32) -> u8 {
        let reg = ((address >> REG_SHIFT) & 0x0f) as u8;
        match address / VIA_SIZE {
            0 => self.via_1.read(reg),
            1 => self.via_2.read(reg),
            _ => {
                debug!(target: "via", "Read unmapped offset 0x{:06x}", address);
                0
            }
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        let reg = ((address >> REG_SHIFT) & 0x0f) as u8;
        match address / VIA_SIZE {
            0 => self.via_1.write(reg, value),
            1 => self.via_2.write(reg, value),
            _ => debug!(target: "via", "Write unmapped offset 0x{:06x}", address),
        }
    }
}

/// One wire of a VIA interrupt fan-in, handed to the device that drives it.
#[derive(Clone)]
pub struct IrqInput {
    via: WeakShared<MacVia>,
    id: ViaId,
    line: usize,
}

impl IrqInput {
    pub fn get_line(&self) -> usize {
        self.line
    }

    pub fn lower(&self) {
        self.set_level(false);
    }

    pub fn raise(&self) {
        self.set_level(true);
    }

    pub fn set_level(&self, level: bool) {
        if let Some(via) = self.via.upgrade() {
            via.borrow_mut().set_irq(self.id, self.line, level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q800_core::device::Adb;
    use q800_core::io::mos6522::{int, reg};
    use q800_core::util::{new_shared, new_shared_cell};

    fn setup_via() -> (Shared<MacVia>, Rc<VirtualClock>, Shared<IrqLine>) {
        let clock = Rc::new(VirtualClock::new());
        let cpu_irq = new_shared(IrqLine::new("cpu"));
        let adb: Shared<dyn AdbBus> = new_shared(Adb::new());
        let via = MacVia::new(
            &ViaConfig::default(),
            clock.clone(),
            Rtc::new(clock.clone(), 0),
            adb,
            cpu_irq.clone(),
            new_shared_cell(false),
        )
        .unwrap();
        let via = new_shared(via);
        via.borrow_mut().reset();
        (via, clock, cpu_irq)
    }

    #[test]
    fn new_rejects_zero_poll_freq() {
        let clock = Rc::new(VirtualClock::new());
        let mut config = ViaConfig::default();
        config.adb_poll_freq = 0;
        let adb: Shared<dyn AdbBus> = new_shared(Adb::new());
        let result = MacVia::new(
            &config,
            clock.clone(),
            Rtc::new(clock.clone(), 0),
            adb,
            new_shared(IrqLine::new("cpu")),
            new_shared_cell(false),
        );
        assert!(result.is_err());
    }

    #[test]
    fn reset_arms_periodic_timers() {
        let (via, _, _) = setup_via();
        assert_eq!(Some(16_630_000), via.borrow().next_deadline());
    }

    #[test]
    fn address_decode() {
        let (via, _, _) = setup_via();
        let mut via = via.borrow_mut();
        via.write(u32::from(reg::DIRA) << 9, 0x5a);
        assert_eq!(0x5a, via.get_via_1().get_registers().dira);
        via.write(VIA_SIZE | (u32::from(reg::DIRA) << 9), 0xa5);
        assert_eq!(0xa5, via.get_via_2().get_registers().dira);
        // low address bits are ignored
        assert_eq!(0x5a, via.read((u32::from(reg::DIRA) << 9) | 0x1ff));
        assert_eq!(0, via.read(2 * VIA_SIZE));
    }

    #[test]
    fn irq_input_routes_to_via() {
        let (via, _, cpu_irq) = setup_via();
        let ier = VIA_SIZE | (u32::from(reg::IER) << 9);
        via.borrow_mut().write(ier, 0x80 | int::CB2);
        let input = MacVia::irq_input(&via, ViaId::Via2, 3);
        input.raise();
        assert_eq!(2, cpu_irq.borrow().get_level());
        input.lower();
        assert_eq!(0, cpu_irq.borrow().get_level());
    }

    #[test]
    fn irq_input_outlives_via() {
        let (via, _, _) = setup_via();
        let input = MacVia::irq_input(&via, ViaId::Via1, 0);
        drop(via);
        input.raise();
    }
}
