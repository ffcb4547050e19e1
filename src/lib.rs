//! Serial Link Library
//!
//! A controller for a single serial connection to an external device. Inbound
//! bytes are split into frames terminated by `0xFF`, decoded to text and
//! delivered to a callback on a background thread. Outbound commands can be
//! sent as text lines, raw bytes, character codes or hex tokens.
//!
//! # Modules
//!
//! - `session`: `PortSession` lifecycle (open/close/start/shutdown) and sending
//! - `reader`: background frame reader and frame buffer
//! - `codec`: command encoders and text encodings
//! - `port`: port abstraction layer (real `serialport` backend and mock)
//! - `state`: `PortConfig` and session state
//! - `config`: TOML configuration with environment overrides
//! - `error`: session error type
//! - `stats`: activity counters
//!
//! # Example
//!
//! ```no_run
//! use serial_link::{PortConfig, PortSession};
//!
//! let config = PortConfig::new("/dev/ttyUSB0", 9600);
//! let session = PortSession::with_system_port(config, |frame| println!("<- {frame}"));
//! session.start()?;
//! session.send_hex_tokens("1A 2B FF")?;
//! session.shutdown();
//! # Ok::<(), serial_link::LinkError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod port;
pub mod reader;
pub mod session;
pub mod state;
pub mod stats;

// Re-export commonly used types for convenience
pub use codec::{EncodeError, Newline, TextEncoding, FRAME_SENTINEL};
pub use error::{LinkError, LinkResult};
pub use port::{
    Handshake, MockOpener, MockSerialPort, Parity, PortError, PortOpener, SerialPortAdapter,
    StopBits, SyncSerialPort, SystemOpener,
};
pub use reader::{FrameBuffer, FrameReader, ReceiveCallback};
pub use session::PortSession;
pub use state::{PortConfig, SessionState};
pub use stats::SessionStats;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
