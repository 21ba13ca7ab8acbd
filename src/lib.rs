//! # wslink - Event-driven WebSocket client engine
//!
//! `wslink` implements the client side of RFC 6455 without owning any I/O.
//! Sockets, name resolution, timers and randomness are supplied by the host
//! through small traits, and their outcomes are fed back as events.
//!
//! ## Features
//!
//! - **Sans-io core** usable from any event loop
//! - **Zero-copy frame parsing** with in-place unmasking
//! - **Bounded buffers** for the handshake and outgoing frames
//! - **Inactivity timeout** covering the whole connection lifetime
//! - **Tokio driver** behind the `async-tokio` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wslink::{Client, Config, Event};
//!
//! let mut client = Client::new(transport, resolver, timer, handler, Config::new());
//! client.connect("example.com", 80, "/")?;
//!
//! // Feed platform callbacks into the engine.
//! client.handle(Event::Connected);
//! client.handle(Event::Received(&mut buf[..n]));
//! ```
//!
//! ## Limitations
//!
//! Only unfragmented frames with payloads up to 65535 bytes are supported.
//! There is no TLS, no extension negotiation and no server role.

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod platform;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod runtime;

pub use config::{Config, Limits};
pub use connection::{Client, Command, ConnectionState, Event, Status, Target};
pub use error::{Error, Result};
pub use handler::{Control, Handler};
pub use platform::{OsRandom, RandomSource, Resolution, Resolver, Timer, Transport};
pub use protocol::{compute_accept_key, Frame, HandshakeKey, OpCode, WS_GUID};

#[cfg(feature = "async-tokio")]
pub use runtime::{Driver, DriverHandle};
