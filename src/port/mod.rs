//! Port abstraction layer for serial communication.
//!
//! Provides the `SerialPortAdapter` and `PortOpener` traits plus a real
//! implementation over the `serialport` crate and an in-memory mock.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemOpener};
pub use traits::*;
