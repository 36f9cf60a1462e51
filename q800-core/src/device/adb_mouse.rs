// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::factory::AdbDevice;

use super::adb::{cmd, listen_register_3};

const DEFAULT_ADDRESS: u8 = 3;
const DEFAULT_HANDLER: u8 = 2;
const SUPPORTED_HANDLERS: [u8; 2] = [1, 2];
const MAX_DELTA: i32 = 63;

/// Single button relative mouse. Motion accumulates between polls and is
/// reported in steps of at most 63 counts per axis.
pub struct AdbMouse {
    address: u8,
    handler_id: u8,
    dx: i32,
    dy: i32,
    button: bool,
    last_button: bool,
}

impl AdbMouse {
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            handler_id: DEFAULT_HANDLER,
            dx: 0,
            dy: 0,
            button: false,
            last_button: false,
        }
    }

    pub fn get_handler_id(&self) -> u8 {
        self.handler_id
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.dx = self.dx.saturating_add(dx);
        self.dy = self.dy.saturating_add(dy);
    }

    pub fn set_button(&mut self, pressed: bool) {
        self.button = pressed;
    }

    fn talk_register_0(&mut self, reply: &mut [u8]) -> usize {
        if self.dx == 0 && self.dy == 0 && self.button == self.last_button {
            return 0;
        }
        let dx = self.dx.max(-MAX_DELTA).min(MAX_DELTA);
        let dy = self.dy.max(-MAX_DELTA).min(MAX_DELTA);
        self.dx -= dx;
        self.dy -= dy;
        self.last_button = self.button;
        reply[0] = (dy as u8 & 0x7f) | if self.button { 0x00 } else { 0x80 };
        reply[1] = (dx as u8 & 0x7f) | 0x80;
        2
    }
}

impl Default for AdbMouse {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbDevice for AdbMouse {
    fn get_address(&self) -> u8 {
        self.address
    }

    fn request(&mut self, request: &[u8], reply: &mut [u8]) -> usize {
        if request[0] & 0x0f == cmd::FLUSH {
            self.dx = 0;
            self.dy = 0;
            self.last_button = self.button;
            return 0;
        }
        let reg = request[0] & 0x03;
        match request[0] & 0x0c {
            cmd::LISTEN => {
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
        self.dx = 0;
        self.dy = 0;
        self.button = false;
        self.last_button = false;
    }
}
