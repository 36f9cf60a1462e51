// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;
use std::sync::{Arc, Mutex};

use log::{LogLevelFilter, LogMetadata, LogRecord};
use q800_core::factory::Chip;
use q800_core::io::mos6522::{reg, Mos6522};
use q800_core::io::via2::Via2;
use q800_core::util::{new_shared, new_shared_cell, IrqLine, VirtualClock};

/// Records messages for a single target, the way `--log via::reg=trace`
/// configures the console logger.
struct TargetLogger {
    target: &'static str,
    records: Arc<Mutex<Vec<String>>>,
}

impl log::Log for TargetLogger {
    fn enabled(&self, metadata: &LogMetadata) -> bool {
        metadata.target() == self.target
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            if let Ok(mut records) = self.records.lock() {
                records.push(format!("{}", record.args()));
            }
        }
    }
}

#[test]
fn register_trace_follows_target_level() {
    let records = Arc::new(Mutex::new(Vec::new()));
    let logger = TargetLogger {
        target: "via::reg",
        records: records.clone(),
    };
    log::set_logger(|max_log_level| {
        max_log_level.set(LogLevelFilter::Trace);
        Box::new(logger)
    })
    .unwrap();

    let clock = Rc::new(VirtualClock::new());
    let mut via = Mos6522::new(
        Via2::new(new_shared_cell(false)),
        783_360,
        clock,
        new_shared(IrqLine::new("cpu")),
        1,
    );
    via.reset();
    records.lock().unwrap().clear();

    via.write(reg::DIRA, 0x5a);
    assert_eq!(0x5a, via.read(reg::DIRA));
    let lines = records.lock().unwrap();
    assert_eq!(2, lines.len());
    assert_eq!("via2 write 0x03 = 0x5a", lines[0]);
    assert_eq!("via2 read 0x03 = 0x5a", lines[1]);
}
