//! Optional structured log of lock lifecycle events.
//!
//! When enabled, every create, acquire and release is appended to a file as
//! one JSON object per line, timestamped with microsecond precision. The log
//! has no effect on detection; it exists for offline inspection of a run's
//! locking behavior.

use crate::core::types::{LockEvent, LockId, ThreadIndex};
use anyhow::{Context, Result};
use chrono::Utc;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// A single logged event.
#[derive(Debug, Serialize)]
struct LogEntry {
    /// Registered index of the acting thread, if it has one.
    thread: Option<ThreadIndex>,
    /// Lock the event concerns.
    lock: LockId,
    event: LockEvent,
    /// Seconds since the Unix epoch.
    timestamp: f64,
}

enum LoggerMode {
    Disabled,
    ToFile(File),
}

struct EventLogger {
    mode: LoggerMode,
}

impl EventLogger {
    fn disabled() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
        }
    }

    fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("failed to open event log file")?;
        Ok(EventLogger {
            mode: LoggerMode::ToFile(file),
        })
    }

    fn log(&mut self, thread: Option<ThreadIndex>, lock: LockId, event: LockEvent) {
        let LoggerMode::ToFile(file) = &mut self.mode else {
            return;
        };

        let now = Utc::now();
        let entry = LogEntry {
            thread,
            lock,
            event,
            timestamp: now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0,
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            let _ = writeln!(file, "{json}");
            let _ = file.flush();
        }
    }
}

lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::disabled());
}

/// Write lock lifecycle events to `path`, one JSON object per line. Must be
/// called before the first wrapped lock is created.
pub fn set_event_log<P: AsRef<Path>>(path: P) -> Result<()> {
    if crate::core::options::is_frozen() {
        anyhow::bail!("the event log must be configured before the first lock is created");
    }
    *GLOBAL_LOGGER.lock() = EventLogger::with_file(path)?;
    Ok(())
}

pub(crate) fn log_event(thread: Option<ThreadIndex>, lock: LockId, event: LockEvent) {
    GLOBAL_LOGGER.lock().log(thread, lock, event);
}
