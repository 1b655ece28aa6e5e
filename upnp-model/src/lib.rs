//! # upnp-model
//!
//! The in-process device/service model consumed by SSDP advertisement and
//! local GENA eventing: state variables with their eventing/moderation
//! declarations, a value store with synchronous change notification, and
//! the narrow device-lookup contract the protocols see the registry
//! through.

mod device;
mod error;
mod service;
mod state;

pub use device::*;
pub use error::*;
pub use service::*;
pub use state::*;
