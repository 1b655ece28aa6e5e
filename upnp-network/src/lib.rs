//! # upnp-network
//!
//! Enumerates the usable local interfaces and addresses the stack binds
//! to, and carries the multicast and stream-listen configuration.
//!
//! The address set is computed once at construction and is immutable for
//! the process lifetime; picking up new interfaces requires a restart.

mod error;
mod factory;

pub use error::*;
pub use factory::*;
