// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use q800_core::device::{Adb, AdbKeyboard, AdbMouse};
use q800_core::factory::{Addressable, AdbBus};
use q800_core::io::rtc::Rtc;
use q800_core::util::{new_shared, new_shared_cell, IrqLine, Shared, SharedCell, VirtualClock};

use crate::config::Config;
use crate::mac_via::{IrqInput, MacVia, ViaId, ViaSnapshot, VIA_SIZE};

// Design:
//   Q800 wires the VIA pair to the rest of the board: the virtual clock, the
//   CPU interrupt line, the ADB bus with its devices and the soft power latch.
//   Time only moves inside `run_for`, which steps from deadline to deadline.

pub struct Q800 {
    // Dependencies
    config: Rc<Config>,
    // Chipset
    via: Shared<MacVia>,
    // Peripherals
    keyboard: Option<Shared<AdbKeyboard>>,
    mouse: Option<Shared<AdbMouse>>,
    // I/O
    cpu_irq: Shared<IrqLine>,
    shutdown_request: SharedCell<bool>,
    // Runtime State
    clock: Rc<VirtualClock>,
}

impl Q800 {
    pub fn build(config: Rc<Config>) -> Result<Q800, String> {
        info!(target: "q800", "Initializing system");
        config.validate()?;
        let clock = Rc::new(VirtualClock::new());
        let cpu_irq = new_shared(IrqLine::new("cpu"));
        let shutdown_request = new_shared_cell(false);

        // Peripherals
        let mut adb = Adb::new();
        let keyboard = if config.adb.keyboard {
            let keyboard = new_shared(AdbKeyboard::new());
            adb.attach(keyboard.clone())?;
            Some(keyboard)
        } else {
            None
        };
        let mouse = if config.adb.mouse {
            let mouse = new_shared(AdbMouse::new());
            adb.attach(mouse.clone())?;
            Some(mouse)
        } else {
            None
        };
        let adb_bus: Shared<dyn AdbBus> = new_shared(adb);

        let mut rtc = Rtc::from_unix_time(clock.clone(), config.rtc.host_time);
        if let Some(ref image) = config.rtc.pram {
            rtc.load_pram(image)?;
        }

        let via = new_shared(MacVia::new(
            &config.via,
            clock.clone(),
            rtc,
            adb_bus,
            cpu_irq.clone(),
            shutdown_request.clone(),
        )?);
        Ok(Q800 {
            config,
            via,
            keyboard,
            mouse,
            cpu_irq,
            shutdown_request,
            clock,
        })
    }

    pub fn get_clock(&self) -> Rc<VirtualClock> {
        self.clock.clone()
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_irq_level(&self) -> u8 {
        self.cpu_irq.borrow().get_level()
    }

    pub fn get_irq_vector(&self) -> Option<u8> {
        self.cpu_irq.borrow().get_vector()
    }

    pub fn get_keyboard(&self) -> Option<Shared<AdbKeyboard>> {
        self.keyboard.clone()
    }

    pub fn get_mouse(&self) -> Option<Shared<AdbMouse>> {
        self.mouse.clone()
    }

    pub fn get_via(&self) -> Shared<MacVia> {
        self.via.clone()
    }

    pub fn irq_input(&self, id: ViaId, line: usize) -> IrqInput {
        MacVia::irq_input(&self.via, id, line)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_request.get()
    }

    pub fn reset(&mut self) {
        info!(target: "q800", "Resetting system");
        self.shutdown_request.set(false);
        self.cpu_irq.borrow_mut().reset();
        self.via.borrow_mut().reset();
    }

    /// Advances virtual time by `duration_ns`, firing every deadline that
    /// falls inside the window in order.
    pub fn run_for(&mut self, duration_ns: u64) {
        let end = self.clock.now_ns().saturating_add(duration_ns);
        loop {
            let deadline = self.via.borrow().next_deadline();
            match deadline {
                Some(deadline) if deadline <= end => {
                    self.clock.advance_to(deadline);
                    self.via.borrow_mut().process_timers();
                }
                _ => break,
            }
        }
        self.clock.advance_to(end);
    }

    // -- State

    pub fn snapshot(&self) -> ViaSnapshot {
        self.via.borrow().snapshot()
    }

    pub fn restore(&mut self, snapshot: &ViaSnapshot) -> Result<(), String> {
        self.via.borrow_mut().restore(snapshot)
    }
}

/// Physical address view of the board. Only the VIA window is decoded.
impl Addressable for Q800 {
    fn read(&mut self, address: u32) -> u8 {
        let base = self.config.via.base_address;
        if address >= base && address - base < 2 * VIA_SIZE {
            self.via.borrow_mut().read(address - base)
        } else {
            debug!(target: "q800", "Read unmapped address 0x{:08x}", address);
            0
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        let base = self.config.via.base_address;
        if address >= base && address - base < 2 * VIA_SIZE {
            self.via.borrow_mut().write(address - base, value);
        } else {
            debug!(target: "q800", "Write unmapped address 0x{:08x}", address);
        }
    }
}
