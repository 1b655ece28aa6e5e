//! # upnp-gena
//!
//! GENA eventing on both sides of the wire: local subscriptions deliver
//! in-process service state changes with moderation, remote subscriptions
//! track a remote service through SUBSCRIBE/NOTIFY/UNSUBSCRIBE, and
//! [`CallbackRoutes`] routes inbound NOTIFY exchanges to the right
//! subscription. XML propertyset handling stays behind
//! [`EventBodyProcessor`].

mod body;
mod callback;
mod error;
mod local;
mod remote;
mod routes;
mod subscription;

#[cfg(test)]
mod testing;

pub use body::*;
pub use callback::*;
pub use error::*;
pub use local::*;
pub use remote::*;
pub use routes::*;
pub use subscription::*;
