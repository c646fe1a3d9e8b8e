//! Durable event log adapter.
//!
//! Implements [`EventSink`] by appending one line per event to a text file
//! on the board's storage (`{timestamp} - {message}`), mirroring each line
//! to the serial console.  Storage errors are reported on the console and
//! otherwise ignored: a full or missing card must never stop the garage.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::events::GarageEvent;
use crate::app::ports::{EventSink, WallTime};

/// Placeholder stamp when the wall clock is unknown.
const UNKNOWN_TIME: &str = "--";

pub struct FileLogSink {
    path: PathBuf,
}

impl FileLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// One log line, newline included.
pub fn format_line(at: Option<WallTime>, event: &GarageEvent) -> String {
    match at {
        Some(t) => format!("{t} - {event}\n"),
        None => format!("{UNKNOWN_TIME} - {event}\n"),
    }
}

impl EventSink for FileLogSink {
    fn emit(&mut self, at: Option<WallTime>, event: &GarageEvent) {
        let line = format_line(at, event);
        info!("LOG | {}", line.trim_end());
        if let Err(e) = self.append(&line) {
            warn!("Could not append to {}: {e}", self.path.display());
        }
    }
}
