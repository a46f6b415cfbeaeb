//! Core types for the rundown control protocol.
//!
//! The message-bus bridge exchanges JSON envelopes: routing metadata wrapped
//! around an opaque body. This crate provides the envelope, its codec, and
//! typed views of the bodies the rundown flow cares about. Correlation and
//! transport live in `rundown-client`.

mod envelope;
mod message;
pub mod types;

pub use envelope::{Envelope, MalformedMessage};
pub use message::{Inbound, PageInfo, PageList, TextReply};
