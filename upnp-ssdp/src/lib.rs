//! # upnp-ssdp
//!
//! The four SSDP protocols: sending and answering M-SEARCH, and sending
//! and receiving multicast NOTIFY presence announcements. All inbound
//! handlers are best-effort; malformed or incomplete datagrams are
//! logged at debug level and dropped without a reply.

mod advert;
mod config;
mod listener;
mod notify;
mod search;

#[cfg(test)]
mod testing;

pub use advert::*;
pub use config::*;
pub use listener::*;
pub use notify::*;
pub use search::*;
