//! Collaborator interfaces the engine is driven through.
//!
//! The engine never performs I/O itself. It asks a [`Transport`] to connect,
//! send and disconnect, a [`Resolver`] to look up host names, a [`Timer`] to
//! schedule the inactivity timeout, and a [`RandomSource`] for handshake keys
//! and frame masks. Completions come back as [`Event`](crate::Event)s passed
//! to [`Client::handle`](crate::Client::handle).

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Byte-stream transport to the server.
///
/// All methods start an operation and return immediately. Completion and
/// failure are reported later as `Event::Connected`, `Event::Sent`,
/// `Event::Error` or `Event::Disconnected`.
pub trait Transport {
    /// Begin connecting to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt cannot be started at all.
    fn connect(&mut self, remote: SocketAddr) -> Result<()>;

    /// Queue `data` for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot accept the data.
    fn send(&mut self, data: Bytes) -> Result<()>;

    /// Tear the connection down. Safe to call when not connected.
    fn disconnect(&mut self);
}

/// Outcome of starting a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Address known immediately (cached or literal).
    Ready(IpAddr),
    /// Lookup in progress; the answer arrives as `Event::Resolved`.
    Pending,
}

/// Host name resolver.
pub trait Resolver {
    /// Start resolving `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a name the resolver will accept.
    fn resolve(&mut self, host: &str) -> Result<Resolution>;
}

/// One-shot timer backing the inactivity timeout.
///
/// Arming replaces any pending arming. Expiry is reported as
/// `Event::TimerFired(generation)`, echoing the value passed to the arming
/// that expired; fires carrying an older generation are ignored.
pub trait Timer {
    /// Fire once after `after` has elapsed.
    fn arm(&mut self, after: Duration, generation: u64);

    /// Cancel a pending expiry, if any.
    fn cancel(&mut self);
}

/// Source of unpredictable bytes for handshake nonces and masking keys.
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Random` if no randomness is available.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system randomness via `getrandom`.
///
/// Stateless, so any number of clients can share it safely.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf)?;
        Ok(())
    }
}
