use thiserror::Error;

use crate::codec::EncodeError;
use crate::port::PortError;

/// A specialized `Result` type for session operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors reported by [`crate::session::PortSession`].
///
/// None of these leave the session half-open: an open failure keeps it
/// Closed, and write or encode failures keep it Open.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device is absent, busy, or access was denied.
    #[error("Failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: PortError,
    },

    /// A send was attempted while the session is Closed.
    #[error("Operation requires an open serial port, but the port is closed.")]
    NotOpen,

    /// The payload could not be encoded; nothing was written.
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] EncodeError),

    /// The write timed out or failed at the I/O level.
    #[error("Failed to write to serial port: {0}")]
    Write(#[source] PortError),
}
