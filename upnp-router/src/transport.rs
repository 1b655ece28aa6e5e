//! Contracts between the router and its transport collaborators.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::oneshot;
use upnp_message::{IncomingDatagram, OutgoingDatagram, StreamRequest, StreamResponse, UpnpMessage};
use upnp_network::BoundAddress;

use crate::error::Result;

/// A per-address unicast/multicast datagram sender.
///
/// The router owns one instance per bound local address and uses the
/// whole set for fan-out. The matching receive side pushes datagrams
/// into [`crate::Router::received_datagram`] from its own loop.
#[async_trait]
pub trait DatagramIo: Send + Sync {
    /// The local address this sender transmits from.
    fn bound_address(&self) -> &BoundAddress;

    /// Send one datagram to its destination.
    async fn send(&self, datagram: &OutgoingDatagram) -> Result<()>;

    /// Send raw bytes, used for the legacy broadcast path.
    async fn send_raw(&self, payload: &[u8], destination: SocketAddr) -> Result<()>;
}

/// The single outbound HTTP client used for GENA exchanges.
///
/// One blocking exchange per call; `None` covers both "no response" and
/// transport-level failure, which callers map to a protocol failure.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn send_request(&self, request: StreamRequest) -> Option<StreamResponse>;
}

/// A running transport receive loop owned by the router, stopped during
/// shutdown. `stop` must be idempotent.
pub trait Transport: Send + Sync {
    fn stop(&self);
}

/// Protocol logic entry points, implemented by the stack's dispatcher
/// and invoked from pooled workers only.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn handle_datagram(&self, datagram: IncomingDatagram);
    async fn handle_stream(&self, job: StreamJob);
}

/// An inbound HTTP exchange handed over by a stream server.
///
/// The server parks on the paired receiver; the handler answers through
/// [`StreamJob::respond`]. Dropping the job unanswered releases the
/// server with an error on its end.
#[derive(Debug)]
pub struct StreamJob {
    pub request: UpnpMessage,
    pub peer: SocketAddr,
    responder: oneshot::Sender<UpnpMessage>,
}

impl StreamJob {
    /// Create a job and the receiver the stream server waits on.
    pub fn new(
        request: UpnpMessage,
        peer: SocketAddr,
    ) -> (Self, oneshot::Receiver<UpnpMessage>) {
        let (responder, response_rx) = oneshot::channel();
        (
            Self {
                request,
                peer,
                responder,
            },
            response_rx,
        )
    }

    /// Answer the exchange. The result is ignored if the server has
    /// already given up waiting.
    pub fn respond(self, response: UpnpMessage) {
        let _ = self.responder.send(response);
    }
}
