// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::VecDeque;

use crate::factory::AdbDevice;

use super::adb::{cmd, listen_register_3};

const DEFAULT_ADDRESS: u8 = 2;
const DEFAULT_HANDLER: u8 = 1;
const QUEUE_SIZE: usize = 16;
// 1: standard, 2: extended, 3: extended with distinct modifiers
const SUPPORTED_HANDLERS: [u8; 3] = [1, 2, 3];

/// Apple keyboard answering Talk R0 with up to two key transitions.
pub struct AdbKeyboard {
    address: u8,
    handler_id: u8,
    queue: VecDeque<u8>,
}

impl AdbKeyboard {
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            handler_id: DEFAULT_HANDLER,
            queue: VecDeque::with_capacity(QUEUE_SIZE),
        }
    }

    pub fn get_handler_id(&self) -> u8 {
        self.handler_id
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn key_down(&mut self, keycode: u8) {
        self.push(keycode & 0x7f);
    }

    pub fn key_up(&mut self, keycode: u8) {
        self.push(keycode | 0x80);
    }

    fn push(&mut self, code: u8) {
        if self.queue.len() >= QUEUE_SIZE {
            warn!(target: "adb", "Keyboard buffer full, dropping 0x{:02x}", code);
            return;
        }
        self.queue.push_back(code);
    }

    fn talk_register_0(&mut self, reply: &mut [u8]) -> usize {
        match self.queue.pop_front() {
            Some(first) => {
                reply[0] = first;
                reply[1] = self.queue.pop_front().unwrap_or(0xff);
                2
            }
            None => 0,
        }
    }
}

impl Default for AdbKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbDevice for AdbKeyboard {
    fn get_address(&self) -> u8 {
        self.address
    }

    fn request(&mut self, request: &[u8], reply: &mut [u8]) -> usize {
        if request[0] & 0x0f == cmd::FLUSH {
            self.queue.clear();
            return 0;
        }
        let reg = request[0] & 0x03;
        match request[0] & 0x0c {
            cmd::LISTEN => {
                // register 2 carries the LED state, which has no host side
                if reg == 3 {
                    listen_register_3(
                        request,
                        &SUPPORTED_HANDLERS,
                        &mut self.address,
                        &mut self.handler_id,
                    );
                }
                0
            }
            cmd::TALK => match reg {
                0 => self.talk_register_0(reply),
                2 => {
                    reply[0] = 0x00;
                    reply[1] = 0x07;
                    2
                }
                3 => {
                    reply[0] = self.address;
                    reply[1] = self.handler_id;
                    2
                }
                _ => 0,
            },
            _ => 0,
        }
    }

    fn reset(&mut self) {
        self.address = DEFAULT_ADDRESS;
        self.handler_id = DEFAULT_HANDLER;
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn talk_r0_returns_transitions_in_pairs() {
        let mut keyboard = AdbKeyboard::new();
        let mut reply = [0u8; 8];
        assert_eq!(0, keyboard.request(&[0x2c], &mut reply));
        keyboard.key_down(0x00);
        keyboard.key_up(0x00);
        keyboard.key_down(0x31);
        assert_eq!(2, keyboard.request(&[0x2c], &mut reply));
        assert_eq!([0x00u8, 0x80], reply[..2]);
        assert_eq!(2, keyboard.request(&[0x2c], &mut reply));
        assert_eq!([0x31u8, 0xff], reply[..2]);
        assert_eq!(false, keyboard.has_pending());
    }

    #[test]
    fn flush_drops_queue() {
        let mut keyboard = AdbKeyboard::new();
        let mut reply = [0u8; 8];
        keyboard.key_down(0x01);
        assert_eq!(0, keyboard.request(&[0x21], &mut reply));
        assert_eq!(false, keyboard.has_pending());
    }

    #[test]
    fn listen_r3_changes_handler() {
        let mut keyboard = AdbKeyboard::new();
        let mut reply = [0u8; 8];
        keyboard.request(&[0x2b, 0x02, 0x03], &mut reply);
        assert_eq!(3, keyboard.get_handler_id());
        keyboard.request(&[0x2b, 0x02, 0x04], &mut reply);
        assert_eq!(3, keyboard.get_handler_id());
    }

    #[test]
    fn queue_is_bounded() {
        let mut keyboard = AdbKeyboard::new();
        for code in 0..(QUEUE_SIZE as u8 + 4) {
            keyboard.key_down(code);
        }
        assert_eq!(QUEUE_SIZE, keyboard.queue.len());
    }
}
