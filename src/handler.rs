//! Application callbacks.

use std::collections::VecDeque;

use crate::connection::{Command, Status};
use crate::protocol::OpCode;

/// Receives status changes and data frames from a [`Client`](crate::Client).
///
/// Callbacks cannot touch the client directly. To send or disconnect from
/// inside a callback, queue a request on the [`Control`] passed in; the
/// client runs it after the current event has been fully processed.
pub trait Handler {
    /// Connection status changed.
    fn on_status(&mut self, status: Status, control: &mut Control);

    /// A Text or Binary frame arrived.
    ///
    /// `payload` points into the receive buffer and is only valid for the
    /// duration of the call.
    fn on_data(&mut self, opcode: OpCode, payload: &[u8], control: &mut Control) {
        let _ = (opcode, payload, control);
    }
}

/// Handler that ignores everything.
impl Handler for () {
    fn on_status(&mut self, _status: Status, _control: &mut Control) {}
}

/// Requests queued by a [`Handler`] during a callback.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Control {
    commands: VecDeque<Command>,
}

impl Control {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame.
    pub fn send(&mut self, opcode: OpCode, payload: impl Into<Vec<u8>>) {
        self.push(Command::Send {
            opcode,
            payload: payload.into(),
        });
    }

    /// Queue a text frame.
    pub fn send_text(&mut self, text: impl Into<String>) {
        self.push(Command::text(text));
    }

    /// Queue a binary frame.
    pub fn send_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.push(Command::binary(data));
    }

    /// Queue a client-initiated close.
    pub fn disconnect(&mut self) {
        self.push(Command::Disconnect);
    }

    /// Queue an arbitrary command.
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }
}
