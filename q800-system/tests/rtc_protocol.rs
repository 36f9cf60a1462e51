// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use q800_core::factory::Addressable;
use q800_core::io::mos6522::reg;
use q800_core::io::rtc::{PRAM_SIZE, RTC_OFFSET};
use q800_core::io::via1::port_b;
use q800_core::util::NANOS_PER_SEC;
use q800_system::{Config, RtcClient, Q800};

fn setup_q800(config: Config) -> (Q800, RtcClient) {
    let client = RtcClient::new(config.via.base_address);
    let mut q800 = Q800::build(Rc::new(config)).unwrap();
    q800.reset();
    (q800, client)
}

#[test]
fn seconds_follow_host_time_and_virtual_clock() {
    let mut config = Config::new();
    config.rtc.host_time = 1_000;
    let (mut q800, client) = setup_q800(config);
    assert_eq!(RTC_OFFSET + 1_000, client.read_seconds(&mut q800));
    q800.run_for(3 * NANOS_PER_SEC);
    assert_eq!(RTC_OFFSET + 1_003, client.read_seconds(&mut q800));
}

#[test]
fn pram_bank_write_then_read() {
    let (mut q800, client) = setup_q800(Config::new());
    client.write_pram_bank(&mut q800, 2, 0xa5);
    assert_eq!(0xa5, client.read_pram_bank(&mut q800, 2));
    assert_eq!(0x00, client.read_pram_bank(&mut q800, 1));
    assert_eq!(0xa5, q800.get_via().borrow().get_rtc().pram()[2]);
}

#[test]
fn xpram_write_then_read() {
    let (mut q800, client) = setup_q800(Config::new());
    client.write_xpram(&mut q800, 3, 0x10, 0x5c);
    assert_eq!(0x5c, client.read_xpram(&mut q800, 3, 0x10));
    assert_eq!(0x5c, q800.get_via().borrow().get_rtc().pram()[3 * 8 + 0x10]);
}

#[test]
fn write_protect_blocks_pram() {
    let (mut q800, client) = setup_q800(Config::new());
    client.set_write_protect(&mut q800, true);
    client.write_pram_bank(&mut q800, 1, 0x42);
    client.write_xpram(&mut q800, 0, 5, 0x42);
    assert_eq!(0x00, client.read_pram_bank(&mut q800, 1));
    assert_eq!(0x00, client.read_xpram(&mut q800, 0, 5));
    client.set_write_protect(&mut q800, false);
    client.write_xpram(&mut q800, 0, 5, 0x42);
    assert_eq!(0x42, client.read_xpram(&mut q800, 0, 5));
}

#[test]
fn pram_image_from_config() {
    let mut image = vec![0u8; PRAM_SIZE];
    image[3] = 0x77;
    image[0x0d] = 0x99;
    let mut config = Config::new();
    config.rtc.pram = Some(image);
    let (mut q800, client) = setup_q800(config);
    assert_eq!(0x77, client.read_pram_bank(&mut q800, 3));
    assert_eq!(0x99, client.read_xpram(&mut q800, 1, 5));
}

#[test]
fn rtc_traffic_leaves_adb_lines_alone() {
    let (mut q800, client) = setup_q800(Config::new());
    let via1_b = q800.get_config().via.base_address;
    client.read_seconds(&mut q800);
    let b = q800.read(via1_b + (u32::from(reg::B) << 9));
    assert_eq!(port_b::ADB_STATE_MASK, b & port_b::ADB_STATE_MASK);
    assert_eq!(port_b::RTC_ENB, b & port_b::RTC_ENB);
}
