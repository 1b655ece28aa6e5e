//! # upnp-stack
//!
//! Facade over the discovery-and-eventing engine: assembles the router,
//! the SSDP protocols and the GENA engine, and dispatches inbound
//! traffic between them. The raw sockets, the device/registry storage
//! and the XML propertyset codec are collaborators the embedder plugs
//! in.

mod dispatcher;
mod stack;

pub use dispatcher::*;
pub use stack::*;

pub use upnp_gena as gena;
pub use upnp_message as message;
pub use upnp_model as model;
pub use upnp_network as network;
pub use upnp_router as router;
pub use upnp_ssdp as ssdp;

/// Install a process-wide `tracing` subscriber reading `RUST_LOG`,
/// defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
