//! Inputs to the connection state machine.

use std::net::IpAddr;

use crate::protocol::OpCode;

/// Something that happened to the connection outside the engine.
///
/// Hosts translate transport, resolver and timer callbacks into events and
/// feed them to [`Client::handle`](crate::Client::handle), one at a time.
#[derive(Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// Name lookup finished; `None` when it failed.
    Resolved(Option<IpAddr>),
    /// Transport connection established.
    Connected,
    /// Transport closed by the peer or the network.
    Disconnected,
    /// Transport failure with a platform-specific code.
    Error(i32),
    /// Bytes arrived. Masked frames are unmasked in place, so the buffer
    /// contents are unspecified afterwards.
    Received(&'a mut [u8]),
    /// A previous send completed.
    Sent,
    /// The inactivity timer expired; carries the generation it was armed with.
    TimerFired(u64),
}

impl Event<'_> {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Event::Resolved(_) => "Resolved",
            Event::Connected => "Connected",
            Event::Disconnected => "Disconnected",
            Event::Error(_) => "Error",
            Event::Received(_) => "Received",
            Event::Sent => "Sent",
            Event::TimerFired(_) => "TimerFired",
        }
    }
}

/// A request to the engine that runs once the current event has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send one frame.
    Send {
        /// Frame opcode.
        opcode: OpCode,
        /// Frame payload.
        payload: Vec<u8>,
    },
    /// Close the connection from this side.
    Disconnect,
}

impl Command {
    /// Text frame request.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Command::Send {
            opcode: OpCode::Text,
            payload: text.into().into_bytes(),
        }
    }

    /// Binary frame request.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Command::Send {
            opcode: OpCode::Binary,
            payload: data.into(),
        }
    }
}
