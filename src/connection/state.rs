//! Client connection lifecycle states.

/// Client connection state.
///
/// ```text
/// Idle ──connect──▶ ResolvingHost ──resolved──▶ Connecting ──connected──▶ AwaitingHandshake
///   │                    │                          ▲  │                        │
///   └──connect (IP)──────┼──────────────────────────┘  │                  valid │ invalid
///                        ▼                             ▼                        ▼
///                      Closed ◀───────────────────── Closed ◀──── Open ◀────────┘
/// ```
///
/// `Closed` behaves like `Idle` for a new `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection has been attempted yet.
    #[default]
    Idle,
    /// Waiting for the host name lookup.
    ResolvingHost,
    /// Transport connection in progress.
    Connecting,
    /// Upgrade request sent, waiting for the server's response.
    AwaitingHandshake,
    /// Handshake validated; frames flow.
    Open,
    /// Connection ended; a new `connect` may start over.
    Closed,
}

impl ConnectionState {
    /// Check if a connection attempt is in progress or established.
    ///
    /// The inactivity timer runs exactly while this holds.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Idle | ConnectionState::Closed)
    }

    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if a new connection attempt may start from this state.
    #[must_use]
    #[inline]
    pub const fn can_connect(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::ResolvingHost => write!(f, "ResolvingHost"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::AwaitingHandshake => write!(f, "AwaitingHandshake"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
