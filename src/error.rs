//! Error types for the WebSocket client engine.
//!
//! Frame and handshake failures are reported here as values; the engine maps
//! them onto [`Status`](crate::Status) notifications instead of letting them
//! cross the callback boundary.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a WebSocket client connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The buffer ends before the frame does.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// 64-bit extended payload length (length field 127).
    #[error("64-bit payload lengths are not supported")]
    UnsupportedLength,

    /// Payload exceeds the configured or protocol maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// FIN clear, or a continuation frame.
    #[error("Fragmented frames are not supported")]
    FragmentedFrame,

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Server handshake response rejected.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// A bounded buffer would overflow.
    #[error("Buffer capacity exceeded: need {needed} bytes (capacity: {capacity})")]
    CapacityExceeded {
        /// Bytes the write would require in total.
        needed: usize,
        /// Fixed capacity of the buffer.
        capacity: usize,
    },

    /// Host or path rejected before any I/O.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Operation not permitted in the current connection state.
    #[error("Operation not permitted while {0}")]
    InvalidState(ConnectionState),

    /// Transport refused an operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The random source could not produce bytes.
    #[error("Random source failure: {0}")]
    Random(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<getrandom::Error> for Error {
    fn from(err: getrandom::Error) -> Self {
        Error::Random(err.to_string())
    }
}
