// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

/// Addressable represents a memory-mapped device window.
pub trait Addressable {
    /// Read byte from the specified address.
    fn read(&mut self, address: u32) -> u8;
    /// Write byte to the specified address.
    fn write(&mut self, address: u32, value: u8);
}

/// A chip represents a system component that is driven by the virtual clock.
pub trait Chip {
    /// Earliest pending timer deadline in virtual nanoseconds.
    fn next_deadline(&self) -> Option<u64>;
    /// Fire every timer whose deadline has been reached.
    fn process_timers(&mut self);
    /// Handle reset signal.
    fn reset(&mut self);
    // I/O
    /// Read value from the specified register.
    fn read(&mut self, reg: u8) -> u8;
    /// Write value to the specified register.
    fn write(&mut self, reg: u8, value: u8);
}

/// Host side of the Apple Desktop Bus as driven through the VIA1 shift
/// register. `state` is the two-bit bus state taken from port B.
pub trait AdbBus {
    /// Hands one byte to the bus. Returns a positive value on success.
    fn send(&mut self, state: u8, data: u8) -> i32;
    /// Fetches one byte from the bus. Returns a positive value on success.
    fn receive(&mut self, state: u8, data: &mut u8) -> i32;
    /// Auto-polls the devices while the host is idle. Returns true when a
    /// device has data to deliver, with the first byte in `data`.
    fn poll(&mut self, state: u8, data: &mut u8) -> bool;
    /// Returns and clears the data-ready strobe raised by the last transfer.
    fn take_data_ready(&mut self) -> bool;
    /// Handle reset signal.
    fn reset(&mut self);
}

/// A device attached to the Apple Desktop Bus.
pub trait AdbDevice {
    fn get_address(&self) -> u8;
    /// Handles a request addressed to this device and returns the reply length.
    fn request(&mut self, request: &[u8], reply: &mut [u8]) -> usize;
    fn reset(&mut self);
}
