// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod cli;
mod util;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::process;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use q800_core::factory::Addressable;
use q800_core::io::mos6522::{int, reg};
use q800_core::io::via1;
use q800_core::util::{NANOS_PER_MILLI, NANOS_PER_SEC};
use q800_system::{RtcClient, ViaSnapshot, Q800, VIA_SIZE};
use structopt::StructOpt;

use crate::cli::Opt;
use crate::util::Logger;

static NAME: &str = "q800";

fn main() {
    let opt = Opt::from_args();
    match run(&opt) {
        Ok(_) => process::exit(0),
        Err(err) => {
            println!("Error: {:#}", err);
            process::exit(1)
        }
    };
}

fn run(opt: &Opt) -> Result<()> {
    let logger =
        Logger::build(opt.log_level.as_str(), &opt.log_target_level).map_err(|e| anyhow!(e))?;
    Logger::enable(logger).map_err(|e| anyhow!(e))?;
    info!("Starting {}", NAME);
    let config = Rc::new(cli::build_config(opt).map_err(|e| anyhow!(e))?);
    let mut q800 = Q800::build(config).map_err(|e| anyhow!(e))?;
    q800.reset();
    if let Some(path) = &opt.load_state {
        load_state(&mut q800, path)?;
    }
    cli::set_q800_options(&mut q800, opt).map_err(|e| anyhow!(e))?;
    let stats = run_machine(&mut q800, opt);
    info!(
        target: "main",
        "Ran {} ms: {} interrupts, {} vbl, {} one second, {} adb, {} via2",
        q800.get_clock().now_ms(),
        stats.interrupts,
        stats.vbl,
        stats.one_second,
        stats.adb,
        stats.via_2
    );
    let rtc = RtcClient::new(q800.get_config().via.base_address);
    let seconds = rtc.read_seconds(&mut q800);
    info!(target: "main", "RTC reads {} seconds since 1904", seconds);
    if let Some(path) = &opt.pram {
        let via = q800.get_via();
        let via = via.borrow();
        fs::write(path, via.get_rtc().pram())
            .with_context(|| format!("Failed to save pram {}", path.display()))?;
    }
    if let Some(path) = &opt.save_state {
        save_state(&q800, path)?;
    }
    Ok(())
}

#[derive(Default)]
struct Stats {
    interrupts: u64,
    vbl: u64,
    one_second: u64,
    adb: u64,
    via_2: u64,
}

/// Steps virtual time in slices and plays the interrupt handler between
/// them: every pending flag is counted and acknowledged through IFR.
fn run_machine(q800: &mut Q800, opt: &Opt) -> Stats {
    let mut stats = Stats::default();
    let end = q800
        .get_clock()
        .now_ns()
        .saturating_add(opt.duration_ms.saturating_mul(NANOS_PER_MILLI));
    let slice = opt.slice_us.saturating_mul(1_000).max(1);
    loop {
        let now = q800.get_clock().now_ns();
        if now >= end {
            break;
        }
        q800.run_for(slice.min(end - now));
        if q800.get_irq_level() > 0 {
            service_irq(q800, &mut stats);
        }
        if q800.is_shutdown_requested() {
            info!(target: "main", "Shutdown at {} ms", q800.get_clock().now_ms());
            break;
        }
        if q800.get_clock().now_ns() % NANOS_PER_SEC == 0 {
            debug!(target: "main", "{} s", q800.get_clock().now_secs());
        }
    }
    stats
}

fn service_irq(q800: &mut Q800, stats: &mut Stats) {
    stats.interrupts += 1;
    if log_enabled!(target: "main", log::LogLevel::Trace) {
        trace!(
            target: "main",
            "IRQ level {} vector {:?}",
            q800.get_irq_level(),
            q800.get_irq_vector()
        );
    }
    let base = q800.get_config().via.base_address;
    let ifr_1 = q800.read(base + (u32::from(reg::IFR) << 9));
    if ifr_1 & 0x80 != 0 {
        if ifr_1 & (1 << via1::irq::VBLANK) != 0 {
            stats.vbl += 1;
        }
        if ifr_1 & (1 << via1::irq::ONE_SECOND) != 0 {
            stats.one_second += 1;
        }
        if ifr_1 & (1 << via1::irq::ADB_READY) != 0 {
            stats.adb += 1;
            let data = q800.read(base + (u32::from(reg::SR) << 9));
            info!(target: "main", "ADB data 0x{:02x}", data);
            // rewriting port B in the idle state lets the next poll through
            let port_b = base + (u32::from(reg::B) << 9);
            let value = q800.read(port_b);
            q800.write(port_b, value);
        }
        if ifr_1 & int::T1 != 0 {
            debug!(target: "main", "VIA1 timer 1");
        }
        q800.write(base + (u32::from(reg::IFR) << 9), ifr_1 & 0x7f);
    }
    let ifr_2 = q800.read(base + VIA_SIZE + (u32::from(reg::IFR) << 9));
    if ifr_2 & 0x80 != 0 {
        stats.via_2 += 1;
        q800.write(base + VIA_SIZE + (u32::from(reg::IFR) << 9), ifr_2 & 0x7f);
    }
}

fn load_state(q800: &mut Q800, path: &Path) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open state {}", path.display()))?;
    let snapshot: ViaSnapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid state {}", path.display()))?;
    q800.restore(&snapshot).map_err(|e| anyhow!(e))?;
    info!(target: "main", "Loaded state from {}", path.display());
    Ok(())
}

fn save_state(q800: &Q800, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create state {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &q800.snapshot())
        .with_context(|| format!("Failed to write state {}", path.display()))?;
    info!(target: "main", "Saved state to {}", path.display());
    Ok(())
}
