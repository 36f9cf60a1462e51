// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::{self, LogLevel, LogLevelFilter, LogMetadata, LogRecord};

static CONFIG_FILE: &str = "logger.conf";

/// Console logger with per-target levels. Targets come from `logger.conf`
/// in the working directory, when present, and then from the command line.
pub struct Logger {
    level: LogLevel,
    targets: HashMap<String, LogLevel>,
}

impl Logger {
    pub fn build(level: &str, targets: &[(String, String)]) -> Result<Logger, String> {
        let mut logger = Logger::new(level)?;
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            logger.load_config(path)?;
        }
        for (target, level) in targets {
            logger.add_target(target.clone(), level)?;
        }
        Ok(logger)
    }

    pub fn new(level: &str) -> Result<Logger, String> {
        let level =
            LogLevel::from_str(level).map_err(|_| format!("invalid log level {}", level))?;
        Ok(Logger {
            level,
            targets: HashMap::new(),
        })
    }

    pub fn enable(logger: Logger) -> Result<(), String> {
        log::set_logger(|max_log_level| {
            max_log_level.set(logger.get_max_level());
            Box::new(logger)
        })
        .map_err(|_| "cannot initialize logging".to_string())
    }

    pub fn add_target(&mut self, target: String, level: &str) -> Result<(), String> {
        let level = LogLevel::from_str(level)
            .map_err(|_| format!("invalid log level {} for target {}", level, target))?;
        self.targets.insert(target, level);
        Ok(())
    }

    pub fn get_level(&self) -> LogLevel {
        self.level
    }

    /// The global filter has to let through the most verbose target.
    fn get_max_level(&self) -> LogLevelFilter {
        self.targets
            .values()
            .fold(self.level, |max, level| max.max(*level))
            .to_log_level_filter()
    }

    pub fn load_config(&mut self, path: &Path) -> Result<(), String> {
        let file = File::open(path)
            .map_err(|err| format!("failed to open file {}: {}", path.display(), err))?;
        let reader = BufReader::new(file);
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.find('=') {
                Some(equals) => {
                    let (target, level) = line.split_at(equals);
                    self.add_target(target.trim().to_string(), level[1..].trim())?;
                }
                None => return Err(format!("invalid logger config line {}", index + 1)),
            }
        }
        Ok(())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &LogMetadata) -> bool {
        let level = self.targets.get(metadata.target()).unwrap_or(&self.level);
        metadata.level() <= *level
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            println!("{} [{}] - {}", record.level(), record.target(), record.args());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_overrides_default_level() {
        let mut logger = Logger::new("info").unwrap();
        logger.add_target("via::rtc".to_string(), "trace").unwrap();
        assert_eq!(LogLevelFilter::Trace, logger.get_max_level());
        assert_eq!(LogLevel::Info, logger.get_level());
        assert!(logger.targets.contains_key("via::rtc"));
    }

    #[test]
    fn rejects_bad_level() {
        assert!(Logger::new("loud").is_err());
        let mut logger = Logger::new("warn").unwrap();
        assert!(logger.add_target("via".to_string(), "loud").is_err());
    }
}
