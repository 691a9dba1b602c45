//! Server configuration.
//!
//! Configuration is a small JSON document; every field is optional and
//! falls back to the values the stock client was tuned against.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DflatResult;
use crate::lines::Line;

/// Busy-hold used to make the host time out (ms).
pub const DEFAULT_ERROR_HOLD_MS: u64 = 500;

/// Filename buffer size, including the terminating nul.
pub const DEFAULT_FILENAME_CAPACITY: usize = 32;

/// Board pin numbers for each line. Line drivers use this; the protocol
/// itself only deals in `Line` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PinAssignment {
    pub clock: u8,
    pub data: [u8; 4],
    pub ready: u8,
    pub select: [u8; 2],
    pub strobe: u8,
    pub ack: u8,
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            clock: 2,
            data: [3, 4, 5, 6],
            ready: 7,
            select: [8, 9],
            strobe: 21,
            ack: 20,
        }
    }
}

impl PinAssignment {
    /// Board pin for a line.
    pub fn pin(&self, line: Line) -> u8 {
        match line {
            Line::Clock => self.clock,
            Line::Data0 => self.data[0],
            Line::Data1 => self.data[1],
            Line::Data2 => self.data[2],
            Line::Data3 => self.data[3],
            Line::Ready => self.ready,
            Line::Select0 => self.select[0],
            Line::Select1 => self.select[1],
            Line::Strobe => self.strobe,
            Line::Ack => self.ack,
        }
    }
}

/// Runtime knobs for `FileServer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// How long to hold busy when signalling an error.
    pub error_hold_ms: u64,
    /// Filename buffer bound in bytes, nul included.
    pub filename_capacity: usize,
    /// Longest wait for a clock edge before giving up on the host (ms).
    /// `None` waits as long as the host keeps the server selected.
    pub clock_stall_ms: Option<u64>,
    /// Initial current directory.
    pub root_path: String,
    /// Line to pin mapping.
    pub pins: PinAssignment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            error_hold_ms: DEFAULT_ERROR_HOLD_MS,
            filename_capacity: DEFAULT_FILENAME_CAPACITY,
            clock_stall_ms: None,
            root_path: "/".to_string(),
            pins: PinAssignment::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(text: &str) -> DflatResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> DflatResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Error busy-hold as a `Duration`.
    pub fn error_hold(&self) -> Duration {
        Duration::from_millis(self.error_hold_ms)
    }

    /// Clock edge wait bound as a `Duration`, if any.
    pub fn clock_stall(&self) -> Option<Duration> {
        self.clock_stall_ms.map(Duration::from_millis)
    }
}
