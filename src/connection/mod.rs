//! Connection engine and its vocabulary.
//!
//! The engine is a single-threaded state machine. Hosts start operations
//! through [`Client`] methods and report outcomes back as [`Event`]s; the
//! engine answers with [`Status`] notifications and data callbacks.
//!
//! ## Connection Lifecycle
//!
//! 1. **Idle** - Nothing started yet
//! 2. **ResolvingHost** - Waiting for the resolver
//! 3. **Connecting** - Waiting for the transport
//! 4. **AwaitingHandshake** - Upgrade request sent, waiting for the `101`
//! 5. **Open** - Frames flow both ways
//! 6. **Closed** - Attempt finished; `connect` may be called again

mod client;
mod event;
mod state;
mod status;
mod supervisor;

pub use client::{Client, Target};
pub use event::{Command, Event};
pub use state::ConnectionState;
pub use status::Status;
pub use supervisor::TimeoutSupervisor;
