//! Configuration and limits for client connections.

use std::time::Duration;

use crate::protocol::frame::{MAX_HEADER_LEN, MAX_PAYLOAD_LEN};

/// Default inactivity window before a connection is considered dead.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Buffer limits for a client connection.
///
/// Every buffer the engine writes into is bounded by one of these values;
/// exceeding a limit fails the operation instead of growing the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload of a single frame, sent or received.
    ///
    /// Capped at 65535 since 64-bit lengths are not supported.
    ///
    /// Default: 65535
    pub max_payload_size: usize,

    /// Capacity of the opening handshake request buffer.
    ///
    /// Default: 512
    pub max_request_size: usize,

    /// Maximum size of the server's handshake response.
    ///
    /// Default: 4 KB (4096)
    pub max_response_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_LEN,
            max_request_size: 512,
            max_response_size: 4096,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    ///
    /// `max_payload_size` is clamped to 65535.
    #[must_use]
    pub const fn new(
        max_payload_size: usize,
        max_request_size: usize,
        max_response_size: usize,
    ) -> Self {
        let max_payload_size = if max_payload_size > MAX_PAYLOAD_LEN {
            MAX_PAYLOAD_LEN
        } else {
            max_payload_size
        };
        Self {
            max_payload_size,
            max_request_size,
            max_response_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max payload: 1 KB
    /// - Request buffer: 256 bytes
    /// - Max response: 1 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_payload_size: 1024,
            max_request_size: 256,
            max_response_size: 1024,
        }
    }

    /// Validate that a frame payload is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_payload_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_payload_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_payload_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a handshake response is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if `size` exceeds the configured maximum.
    pub const fn check_response_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_response_size {
            Err(crate::Error::CapacityExceeded {
                needed: size,
                capacity: self.max_response_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Client connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Buffer limits.
    pub limits: Limits,

    /// Inactivity window. The connection is closed when nothing has been
    /// sent or received for this long.
    ///
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Size of the receive buffer used by the tokio driver. Raised to
    /// [`read_capacity`](Self::read_capacity) when smaller.
    ///
    /// Default: one maximum-size frame (65543)
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            timeout: DEFAULT_TIMEOUT,
            read_buffer_size: MAX_PAYLOAD_LEN + MAX_HEADER_LEN,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the inactivity window.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the inactivity window in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(self, millis: u64) -> Self {
        self.with_timeout(Duration::from_millis(millis))
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Receive buffer size actually used: large enough for a handshake
    /// response followed by one frame at the payload limit.
    #[must_use]
    pub const fn read_capacity(&self) -> usize {
        let needed =
            self.limits.max_response_size + self.limits.max_payload_size + MAX_HEADER_LEN;
        if self.read_buffer_size > needed {
            self.read_buffer_size
        } else {
            needed
        }
    }
}
