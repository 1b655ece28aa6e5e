//! # upnp-router
//!
//! The transport router: owns one datagram sender per bound local
//! address, fans every outbound datagram across all of them, and hands
//! every inbound datagram or stream exchange to a pooled worker running
//! protocol logic. The socket receive loops never execute protocol code
//! and never block on it.
//!
//! The raw socket transports themselves are external collaborators
//! reached through the contracts in [`transport`].

mod error;
mod http;
mod router;
mod transport;

pub use error::*;
pub use http::*;
pub use router::*;
pub use transport::*;
