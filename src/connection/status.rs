//! Status notifications delivered to the application.

/// Connection status change reported through [`Handler::on_status`](crate::Handler::on_status).
///
/// Every variant except `Connected` ends the current attempt; the engine
/// never retries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Handshake validated; the connection is open.
    Connected,
    /// Host name lookup failed.
    DnsError,
    /// Transport failed or the server closed the connection.
    Disconnected,
    /// Nothing was sent or received within the configured window.
    ConnectionTimeout,
    /// Server response missing or carrying a wrong accept value.
    HandshakeError,
    /// Malformed or unsupported frame received.
    FrameParseError,
}

impl Status {
    /// Check if this status reports a failure.
    #[must_use]
    #[inline]
    pub const fn is_error(&self) -> bool {
        !matches!(self, Status::Connected | Status::Disconnected)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Connected => "Connected",
            Status::DnsError => "DNS error",
            Status::Disconnected => "Disconnected",
            Status::ConnectionTimeout => "Connection timeout",
            Status::HandshakeError => "Handshake error",
            Status::FrameParseError => "Frame parse error",
        };
        f.write_str(name)
    }
}
