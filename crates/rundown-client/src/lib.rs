//! Request/response correlation over the rundown WebSocket bridge.
//!
//! The bridge itself offers no pairing between requests and replies, only a
//! stream of independently typed JSON envelopes. This crate layers calls on
//! top: every request gets a fresh id and an expiration, replies resolve
//! pending calls in whatever order they arrive, expired calls are swept and
//! rejected, and the Ping/Pong handshake discovers the peer address that
//! later calls are sent to.
//!
//! [`Client::connect`] yields a cloneable handle plus a [`Driver`] that owns
//! the socket; spawn the driver and issue calls from the handle.

mod client;
mod driver;
mod error;
mod registry;

pub use client::{Client, ClientConfig, DEFAULT_SENDER_ID};
pub use driver::Driver;
pub use error::{CallError, ClientError};
