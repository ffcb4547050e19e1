use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::codec::{Newline, TextEncoding};
use crate::port::{Handshake, Parity, StopBits};

/// Connection parameters for one serial link.
///
/// A session copies this at construction and never mutates it; changing a
/// setting means closing and building a new session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub stop_bits: StopBits,
    #[serde(default)]
    pub encoding: TextEncoding,
    #[serde(default)]
    pub newline: Newline,
    #[serde(default)]
    pub handshake: Handshake,
    #[serde(default)]
    pub dtr_enable: bool,
    #[serde(default)]
    pub rts_enable: bool,
    #[serde(default = "default_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_timeout")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_auto_open")]
    pub auto_open: bool,
}

// Default configuration constants
pub const DEFAULT_DATA_BITS: u8 = 8;
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Default data bits (8).
pub fn default_data_bits() -> u8 {
    DEFAULT_DATA_BITS
}

/// Default read/write timeout (50 ms).
pub fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Sessions open on start unless told otherwise.
pub fn default_auto_open() -> bool {
    true
}

impl PortConfig {
    /// Config with the given port and baud rate and defaults for everything else.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            parity: Parity::default(),
            data_bits: DEFAULT_DATA_BITS,
            stop_bits: StopBits::default(),
            encoding: TextEncoding::default(),
            newline: Newline::default(),
            handshake: Handshake::default(),
            dtr_enable: false,
            rts_enable: false,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_open: default_auto_open(),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Open/closed state of a session.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Closed,
    Open,
}
