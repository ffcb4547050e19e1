//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets the session and the frame reader work against real
//! hardware and the in-memory mock interchangeably. `PortOpener` is the seam a
//! session uses to create handles, so tests can count and inspect them.

use super::error::PortError;
use crate::state::PortConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boxed handle owned by a session or a frame reader.
pub type PortAdapter = Box<dyn SerialPortAdapter>;

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = PortError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Mark | Parity::Space => Err(PortError::config(format!(
                "{parity:?} parity is not supported by the serial backend"
            ))),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = PortError;

    fn try_from(bits: StopBits) -> Result<Self, Self::Error> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(PortError::config(
                "1.5 stop bits are not supported by the serial backend",
            )),
        }
    }
}

/// Handshake (flow control) modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handshake {
    #[default]
    None,
    XOnXOff,
    Rts,
    RtsXOnXOff,
}

impl Handshake {
    /// Whether the RTS line is driven by hardware flow control.
    pub fn uses_rts(self) -> bool {
        matches!(self, Self::Rts | Self::RtsXOnXOff)
    }
}

impl From<Handshake> for serialport::FlowControl {
    fn from(handshake: Handshake) -> Self {
        match handshake {
            Handshake::None => serialport::FlowControl::None,
            Handshake::XOnXOff => serialport::FlowControl::Software,
            // serialport has no combined mode; hardware flow control wins.
            Handshake::Rts | Handshake::RtsXOnXOff => serialport::FlowControl::Hardware,
        }
    }
}

/// Convert a numeric data-bit count into the backend's enum.
pub fn data_bits(bits: u8) -> Result<serialport::DataBits, PortError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(PortError::config(format!(
            "data bits must be between 5 and 8, got {other}"
        ))),
    }
}

/// Trait for serial port I/O operations.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Implementations must write the whole slice or fail; a session relies on
    /// one call putting one command on the wire.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes into the provided buffer, blocking up to the port timeout.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the timeout for subsequent blocking operations on this handle.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Block until all buffered output has been transmitted.
    fn flush(&mut self) -> Result<(), PortError>;

    /// Create a second handle onto the same connection.
    ///
    /// The session writes through the original and hands the clone to the
    /// frame reader, so reads never contend with the write lock.
    ///
    /// On Windows a duplicated COM handle shares its timeouts with the
    /// original, so a timeout set on either handle applies to both.
    fn try_clone_adapter(&self) -> Result<PortAdapter, PortError>;
}

/// Creates port handles for a session.
pub trait PortOpener: Send + Sync {
    /// Open the connection described by `config`.
    fn open(&self, config: &PortConfig) -> Result<PortAdapter, PortError>;
}
