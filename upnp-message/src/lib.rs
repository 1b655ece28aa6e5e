//! # upnp-message
//!
//! Wire-level message model for the UPnP stack: SSDP/GENA operations, an
//! ordered multi-value header collection, and typed headers that round-trip
//! to their exact wire text.
//!
//! This crate is purely in-memory; sockets and HTTP live behind the
//! transport contracts in `upnp-router`.

mod error;
mod header;
mod message;
mod typed;
mod types;

pub use error::*;
pub use header::*;
pub use message::*;
pub use typed::*;
pub use types::*;
