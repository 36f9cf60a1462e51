// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use log::LogLevel;

use crate::factory::{AdbBus, AdbDevice};
use crate::util::Shared;

// Spec: Apple Macintosh Family Hardware Reference, Table 19-10 ADB transaction states

pub mod state {
    pub const NEW: u8 = 0;
    pub const EVEN: u8 = 1;
    pub const ODD: u8 = 2;
    pub const IDLE: u8 = 3;
}

pub mod cmd {
    pub const SEND_RESET: u8 = 0x00;
    pub const FLUSH: u8 = 0x01;
    pub const LISTEN: u8 = 0x08;
    pub const TALK: u8 = 0x0c;
}

/// Second byte of a Listen R3 request.
pub mod handler {
    pub const CHANGE_ID_AND_ENABLE: u8 = 0x00;
    pub const CHANGE_ID_AND_ACT: u8 = 0xfd;
    pub const CHANGE_ID: u8 = 0xfe;
    pub const SELF_TEST: u8 = 0xff;
}

pub const MAX_DEVICES: usize = 16;
pub const RET_NOT_PRESENT: i32 = -2;

const DATA_OUT_SIZE: usize = 16;
const DATA_IN_SIZE: usize = 128;

/// Applies a Listen R3 request to a device's address and handler id. Only
/// handler ids listed in `supported` are taken over.
pub fn listen_register_3(request: &[u8], supported: &[u8], address: &mut u8, handler_id: &mut u8) {
    if request.len() < 3 {
        return;
    }
    match request[2] {
        handler::SELF_TEST => {}
        handler::CHANGE_ID | handler::CHANGE_ID_AND_ACT | handler::CHANGE_ID_AND_ENABLE => {
            *address = request[1] & 0x0f;
        }
        value => {
            *address = request[1] & 0x0f;
            if supported.contains(&value) {
                *handler_id = value;
            }
        }
    }
}

pub struct Adb {
    // Devices
    devices: Vec<Shared<dyn AdbDevice>>,
    poll_index: usize,
    // Runtime State
    data_out: [u8; DATA_OUT_SIZE],
    data_out_index: usize,
    data_in: [u8; DATA_IN_SIZE],
    data_in_size: i32,
    data_in_index: i32,
    data_ready: bool,
}

impl Adb {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            poll_index: 0,
            data_out: [0; DATA_OUT_SIZE],
            data_out_index: 0,
            data_in: [0; DATA_IN_SIZE],
            data_in_size: 0,
            data_in_index: 0,
            data_ready: false,
        }
    }

    pub fn attach(&mut self, device: Shared<dyn AdbDevice>) -> Result<(), String> {
        if self.devices.len() >= MAX_DEVICES {
            return Err(format!("adb bus supports at most {} devices", MAX_DEVICES));
        }
        info!(target: "adb", "Attached device at address {}", device.borrow().get_address());
        self.devices.push(device);
        Ok(())
    }

    pub fn get_device_count(&self) -> usize {
        self.devices.len()
    }

    /// Executes one bus command and returns the reply length, 0 for bus
    /// reset and `RET_NOT_PRESENT` when no device answers the address.
    pub fn request(&mut self, request: &[u8], reply: &mut [u8]) -> i32 {
        if request.is_empty() {
            return 0;
        }
        if request[0] & 0x0f == cmd::SEND_RESET {
            debug!(target: "adb", "Bus reset");
            for device in &self.devices {
                device.borrow_mut().reset();
            }
            return 0;
        }
        let address = request[0] >> 4;
        match self
            .devices
            .iter()
            .find(|device| device.borrow().get_address() == address)
        {
            Some(device) => {
                let len = device.borrow_mut().request(request, reply);
                if log_enabled!(target: "adb", LogLevel::Trace) {
                    trace!(target: "adb", "Request {:02x?} = {:02x?}", request, &reply[..len]);
                }
                len as i32
            }
            None => {
                debug!(target: "adb", "No device at address {}", address);
                RET_NOT_PRESENT
            }
        }
    }

    /// Talks register 0 of each device in turn, starting where the last poll
    /// stopped, until one has data. The reply is prefixed with the command.
    fn poll_devices(&mut self, poll_mask: u16) -> i32 {
        let mut len = 0;
        let count = self.devices.len();
        for _ in 0..count {
            if self.poll_index >= count {
                self.poll_index = 0;
            }
            let address = self.devices[self.poll_index].borrow().get_address();
            if (1u16 << address) & poll_mask != 0 {
                let request = [cmd::TALK | (address << 4)];
                let mut reply = [0u8; DATA_IN_SIZE - 1];
                len = self.request(&request, &mut reply);
                if len > 0 {
                    self.data_in[0] = request[0];
                    self.data_in[1..=len as usize].copy_from_slice(&reply[..len as usize]);
                    len += 1;
                    break;
                }
            }
            self.poll_index += 1;
        }
        len
    }

    fn next_data_in(&mut self) -> u8 {
        let index = self.data_in_index.max(0) as usize;
        self.data_in_index += 1;
        self.data_in.get(index).copied().unwrap_or(0)
    }
}

impl Default for Adb {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbBus for Adb {
    fn send(&mut self, state: u8, data: u8) -> i32 {
        match state {
            state::NEW => self.data_out_index = 0,
            state::EVEN if self.data_out_index & 1 == 0 => return 0,
            state::ODD if self.data_out_index & 1 != 0 => return 0,
            state::IDLE => return 0,
            _ => {}
        }
        if self.data_out_index >= DATA_OUT_SIZE {
            warn!(target: "adb", "Command buffer overflow");
            return 0;
        }
        self.data_out[self.data_out_index] = data;
        self.data_out_index += 1;
        self.data_ready = true;
        1
    }

    fn receive(&mut self, state: u8, data: &mut u8) -> i32 {
        match state {
            state::NEW => return 0,
            state::EVEN | state::ODD => {
                if self.data_in_size <= 0 {
                    self.data_ready = true;
                    return 0;
                }
                if self.data_in_index >= self.data_in_size {
                    *data = 0;
                    self.data_ready = true;
                    return 1;
                }
                let odd_index = self.data_in_index & 1 != 0;
                if (state == state::EVEN) != odd_index {
                    return 0;
                }
            }
            _ => {
                if self.data_out_index == 0 {
                    return 0;
                }
                let request = self.data_out;
                let request_len = self.data_out_index;
                let mut reply = [0u8; DATA_IN_SIZE];
                self.data_in_size = self.request(&request[..request_len], &mut reply);
                self.data_in = reply;
                self.data_out_index = 0;
                self.data_in_index = 0;
                if self.data_in_size < 0 {
                    *data = 0xff;
                    self.data_ready = true;
                    return -1;
                }
                if self.data_in_size == 0 {
                    return 0;
                }
            }
        }
        *data = self.next_data_in();
        self.data_ready = true;
        if *data == 0xff || *data == 0 {
            0
        } else {
            1
        }
    }

    fn poll(&mut self, state: u8, data: &mut u8) -> bool {
        if state != state::IDLE {
            return false;
        }
        if self.data_in_size < self.data_in_index {
            return false;
        }
        if self.data_out_index != 0 {
            return false;
        }
        self.data_in_index = 0;
        self.data_in_size = self.poll_devices(0xffff);
        if self.data_in_size > 0 {
            *data = self.next_data_in();
            self.data_ready = true;
            true
        } else {
            false
        }
    }

    fn take_data_ready(&mut self) -> bool {
        let data_ready = self.data_ready;
        self.data_ready = false;
        data_ready
    }

    fn reset(&mut self) {
        self.poll_index = 0;
        self.data_out_index = 0;
        self.data_in_size = 0;
        self.data_in_index = 0;
        self.data_ready = false;
        for device in &self.devices {
            device.borrow_mut().reset();
        }
    }
}
