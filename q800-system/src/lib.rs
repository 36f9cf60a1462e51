// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

pub mod config;
mod mac_via;
mod q800;
mod rtc_client;

pub use self::config::{AdbConfig, Config, RtcConfig, ViaConfig};
pub use self::mac_via::{IrqInput, MacVia, ViaId, ViaSnapshot, VIA_SIZE};
pub use self::q800::Q800;
pub use self::rtc_client::RtcClient;
