//! Test harness for driving the connection engine.
//!
//! Provides recording collaborators for the sans-io tests and a minimal
//! upgrade-then-echo server for the tokio driver tests.

#![allow(dead_code)]

mod mocks;
mod server;

pub use mocks::*;
pub use server::TestServer;
