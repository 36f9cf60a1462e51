// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::error::Error;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use q800_core::factory::Addressable;
use q800_core::io::mos6522::reg;
use q800_system::{Config, Q800, VIA_SIZE};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "q800")]
pub struct Opt {
    /// run for this many milliseconds of virtual time
    #[structopt(long = "duration", default_value = "1000")]
    pub duration_ms: u64,
    /// service interrupts every this many microseconds of virtual time
    #[structopt(long = "slice", default_value = "1000")]
    pub slice_us: u64,
    /// load parameter RAM from this file and save it back on exit
    #[structopt(long, parse(from_os_str))]
    pub pram: Option<PathBuf>,
    /// restore VIA state from a JSON snapshot
    #[structopt(long = "load-state", parse(from_os_str))]
    pub load_state: Option<PathBuf>,
    /// write VIA state to a JSON snapshot on exit
    #[structopt(long = "save-state", parse(from_os_str))]
    pub save_state: Option<PathBuf>,
    /// set the RTC from this Unix time instead of the host clock
    #[structopt(long = "rtc-time")]
    pub rtc_time: Option<u64>,

    // -- Chipset
    /// set 6522 timer clock in Hz
    #[structopt(long = "timer-freq", default_value = "783360")]
    pub timer_freq: u64,
    /// set ADB autopoll rate in Hz
    #[structopt(long = "adb-poll-freq", default_value = "50")]
    pub adb_poll_freq: u64,
    /// set VIA1 interrupt enable mask (hex)
    #[structopt(long = "via1-ier", default_value = "07", parse(try_from_str = parse_hex_u8))]
    pub via1_ier: u8,
    /// set VIA2 interrupt enable mask (hex)
    #[structopt(long = "via2-ier", default_value = "00", parse(try_from_str = parse_hex_u8))]
    pub via2_ier: u8,

    // -- Devices
    /// detach the ADB keyboard
    #[structopt(long = "nokeyboard")]
    pub no_keyboard: bool,
    /// detach the ADB mouse
    #[structopt(long = "nomouse")]
    pub no_mouse: bool,
    /// queue a key press and release (hex ADB key code)
    #[structopt(long, parse(try_from_str = parse_hex_u8))]
    pub key: Vec<u8>,
    /// move the mouse by DX,DY
    #[structopt(long = "mouse-move", parse(try_from_str = parse_mouse_move))]
    pub mouse_move: Option<(i32, i32)>,
    /// press the mouse button
    #[structopt(long)]
    pub click: bool,

    // -- Logging
    /// set log level
    #[structopt(long = "loglevel", default_value = "info")]
    pub log_level: String,
    /// set log level for a target
    #[structopt(long = "log", parse(try_from_str = parse_key_val))]
    pub log_target_level: Vec<(String, String)>,
}

pub fn build_config(opt: &Opt) -> Result<Config, String> {
    let mut config = Config::new();
    config.via.timer_freq = opt.timer_freq;
    config.via.adb_poll_freq = opt.adb_poll_freq;
    config.rtc.host_time = opt.rtc_time.unwrap_or_else(host_time);
    config.rtc.pram = match opt.pram {
        Some(ref path) if path.exists() => Some(
            load_file(path).map_err(|err| format!("Invalid pram {}: {}", path.display(), err))?,
        ),
        _ => None,
    };
    config.adb.keyboard = !opt.no_keyboard;
    config.adb.mouse = !opt.no_mouse;
    config.validate()?;
    Ok(config)
}

pub fn set_q800_options(q800: &mut Q800, opt: &Opt) -> Result<(), String> {
    set_irq_options(q800, opt);
    set_device_options(q800, opt)?;
    Ok(())
}

fn set_irq_options(q800: &mut Q800, opt: &Opt) {
    let ier = q800.get_config().via.base_address + (u32::from(reg::IER) << 9);
    q800.write(ier, 0x80 | opt.via1_ier);
    q800.write(ier + VIA_SIZE, 0x80 | opt.via2_ier);
}

fn set_device_options(q800: &mut Q800, opt: &Opt) -> Result<(), String> {
    if !opt.key.is_empty() {
        let keyboard = q800
            .get_keyboard()
            .ok_or_else(|| "Keys given but no keyboard attached".to_string())?;
        let mut keyboard = keyboard.borrow_mut();
        for key in &opt.key {
            keyboard.key_down(*key);
            keyboard.key_up(*key);
        }
    }
    if opt.mouse_move.is_some() || opt.click {
        let mouse = q800
            .get_mouse()
            .ok_or_else(|| "Mouse input given but no mouse attached".to_string())?;
        let mut mouse = mouse.borrow_mut();
        if let Some((dx, dy)) = opt.mouse_move {
            mouse.move_by(dx, dy);
        }
        mouse.set_button(opt.click);
    }
    Ok(())
}

fn host_time() -> u64 {
    time::get_time().sec.max(0) as u64
}

fn load_file(path: &Path) -> Result<Vec<u8>, io::Error> {
    let mut data = Vec::new();
    let mut file = File::open(path)?;
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn parse_hex_u8(s: &str) -> Result<u8, Box<dyn Error>> {
    let digits = s.trim_start_matches("0x");
    Ok(u8::from_str_radix(digits, 16)?)
}

fn parse_mouse_move(s: &str) -> Result<(i32, i32), Box<dyn Error>> {
    let pos = s
        .find(',')
        .ok_or_else(|| format!("invalid DX,DY: no `,` found in `{}`", s))?;
    Ok((s[..pos].trim().parse()?, s[pos + 1..].trim().parse()?))
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
    U: std::str::FromStr,
    U::Err: Error + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex() {
        assert_eq!(0x7f, parse_hex_u8("7f").unwrap());
        assert_eq!(0x12, parse_hex_u8("0x12").unwrap());
        assert!(parse_hex_u8("1ff").is_err());
    }

    #[test]
    fn parse_mouse() {
        assert_eq!((5, -3), parse_mouse_move("5,-3").unwrap());
        assert!(parse_mouse_move("5").is_err());
    }

    #[test]
    fn config_from_args() {
        let opt = Opt::from_iter(&["q800", "--rtc-time", "100", "--nomouse", "--adb-poll-freq", "60"]);
        let config = build_config(&opt).unwrap();
        assert_eq!(100, config.rtc.host_time);
        assert_eq!(60, config.via.adb_poll_freq);
        assert_eq!(false, config.adb.mouse);
        assert_eq!(true, config.adb.keyboard);
    }

    #[test]
    fn config_rejects_zero_poll_freq() {
        let opt = Opt::from_iter(&["q800", "--adb-poll-freq", "0"]);
        assert!(build_config(&opt).is_err());
    }
}
