// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use q800_core::io::rtc::PRAM_SIZE;
use q800_core::util::NANOS_PER_SEC;

use crate::mac_via::VIA_SIZE;

pub struct Config {
    pub via: ViaConfig,
    pub rtc: RtcConfig,
    pub adb: AdbConfig,
}

impl Config {
    pub fn new() -> Config {
        Config {
            via: ViaConfig::default(),
            rtc: RtcConfig::default(),
            adb: AdbConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.via.validate()?;
        self.rtc.validate()?;
        Ok(())
    }
}

pub struct ViaConfig {
    pub base_address: u32,
    pub timer_freq: u64,
    pub vbl_period_ns: u64,
    pub one_second_period_ns: u64,
    pub adb_poll_freq: u64,
}

impl ViaConfig {
    pub fn default() -> ViaConfig {
        ViaConfig {
            base_address: 0x50f0_0000,
            timer_freq: 783_360,
            vbl_period_ns: 16_630_000,
            one_second_period_ns: NANOS_PER_SEC,
            adb_poll_freq: 50,
        }
    }

    pub fn adb_poll_period_ns(&self) -> u64 {
        NANOS_PER_SEC / self.adb_poll_freq
    }

    pub fn validate(&self) -> Result<(), String> {
        let window = 2 * VIA_SIZE;
        if self.base_address % window != 0 {
            return Err(format!(
                "via base address 0x{:08x} is not aligned to 0x{:x}",
                self.base_address, window
            ));
        }
        if self.base_address.checked_add(window).is_none() {
            return Err(format!("via base address 0x{:08x} out of range", self.base_address));
        }
        if self.vbl_period_ns == 0 {
            return Err("vbl period must be non-zero".to_string());
        }
        if self.one_second_period_ns == 0 {
            return Err("one second period must be non-zero".to_string());
        }
        if self.adb_poll_freq == 0 || self.adb_poll_freq > NANOS_PER_SEC {
            return Err(format!("invalid adb poll frequency {}", self.adb_poll_freq));
        }
        Ok(())
    }
}

pub struct RtcConfig {
    /// Unix time in seconds the seconds register starts from.
    pub host_time: u64,
    pub pram: Option<Vec<u8>>,
}

impl RtcConfig {
    pub fn default() -> RtcConfig {
        RtcConfig {
            host_time: 0,
            pram: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.pram {
            Some(ref pram) if pram.len() != PRAM_SIZE => Err(format!(
                "invalid pram image size {}, expected {}",
                pram.len(),
                PRAM_SIZE
            )),
            _ => Ok(()),
        }
    }
}

pub struct AdbConfig {
    pub keyboard: bool,
    pub mouse: bool,
}

impl AdbConfig {
    pub fn default() -> AdbConfig {
        AdbConfig {
            keyboard: true,
            mouse: true,
        }
    }
}
