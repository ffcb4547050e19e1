//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` trait for dependency injection and testing.

use super::error::PortError;
use super::traits::{data_bits, PortAdapter, PortOpener, SerialPortAdapter};
use crate::state::PortConfig;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// The handle starts with the configured write timeout; a frame reader
    /// switches its own clone to the read timeout.
    ///
    /// # Example
    /// ```no_run
    /// use serial_link::port::SyncSerialPort;
    /// use serial_link::state::PortConfig;
    ///
    /// let config = PortConfig::new("/dev/ttyUSB0", 9600);
    /// let port = SyncSerialPort::open(&config)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &PortConfig) -> Result<Self, PortError> {
        let port_name = config.port_name.as_str();
        let mut port = serialport::new(port_name, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .flow_control(config.handshake.into())
            .parity(config.parity.try_into()?)
            .stop_bits(config.stop_bits.try_into()?)
            .timeout(config.write_timeout())
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        port.write_data_terminal_ready(config.dtr_enable)?;
        if config.handshake.uses_rts() {
            debug!("RTS is under hardware flow control on {}", port_name);
        } else {
            port.write_request_to_send(config.rts_enable)?;
        }

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write_all(data)?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port.flush().map_err(PortError::Io)
    }

    fn try_clone_adapter(&self) -> Result<PortAdapter, PortError> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// Opens real OS serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(&self, config: &PortConfig) -> Result<PortAdapter, PortError> {
        Ok(Box::new(SyncSerialPort::open(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{Parity, StopBits};

    #[test]
    fn test_port_not_found_error() {
        let config = PortConfig::new("/dev/nonexistent_port_12345", 9600);
        let result = SyncSerialPort::open(&config);

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) | Err(PortError::Io(_)) => {}
            other => panic!("Expected open failure, got: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_settings_rejected_before_open() {
        let mut config = PortConfig::new("/dev/nonexistent_port_12345", 9600);
        config.parity = Parity::Space;
        assert!(matches!(
            SyncSerialPort::open(&config),
            Err(PortError::Config(_))
        ));

        let mut config = PortConfig::new("/dev/nonexistent_port_12345", 9600);
        config.stop_bits = StopBits::OnePointFive;
        assert!(matches!(
            SyncSerialPort::open(&config),
            Err(PortError::Config(_))
        ));

        let mut config = PortConfig::new("/dev/nonexistent_port_12345", 9600);
        config.data_bits = 9;
        assert!(matches!(
            SyncSerialPort::open(&config),
            Err(PortError::Config(_))
        ));
    }
}
