//! The message router: fan-out sends, pooled inbound dispatch.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use upnp_message::{
    HardwareAddressHeader, IncomingDatagram, OutgoingDatagram, StreamRequest, StreamResponse,
    UpnpMessage,
};
use upnp_network::NetworkAddressFactory;

use crate::transport::{DatagramIo, ProtocolHandler, StreamClient, StreamJob, Transport};

/// UDP discard port, the target of the legacy broadcast path.
const BROADCAST_PORT: u16 = 9;

/// Worker and queue sizing for the two dispatch pools.
///
/// The pools are sized independently so a slow HTTP exchange can never
/// starve SSDP datagram processing.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub datagram_workers: usize,
    pub stream_workers: usize,
    pub datagram_queue: usize,
    pub stream_queue: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            datagram_workers: 2,
            stream_workers: 2,
            datagram_queue: 64,
            stream_queue: 16,
        }
    }
}

/// Owns the per-address senders and the dispatch pools.
///
/// Outbound datagrams are transmitted once per bound address, each copy
/// stamped with that address's hardware header, so a multi-homed host
/// announces itself on every reachable network. Inbound work is queued
/// to a bounded pool; when the queue is full the work is discarded with
/// a warning rather than blocking the submitting receive loop, since the
/// protocols self-heal via periodic re-announcement.
pub struct Router {
    senders: Vec<Arc<dyn DatagramIo>>,
    stream_client: Option<Arc<dyn StreamClient>>,
    network: Arc<NetworkAddressFactory>,
    datagram_tx: mpsc::Sender<IncomingDatagram>,
    stream_tx: mpsc::Sender<StreamJob>,
    transports: Mutex<Vec<Arc<dyn Transport>>>,
    closed: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
}

impl Router {
    /// Create the router and spawn its worker pools. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: RouterConfig,
        network: Arc<NetworkAddressFactory>,
        senders: Vec<Arc<dyn DatagramIo>>,
        stream_client: Option<Arc<dyn StreamClient>>,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Arc<Self> {
        let (datagram_tx, datagram_rx) = mpsc::channel(config.datagram_queue.max(1));
        let (stream_tx, stream_rx) = mpsc::channel(config.stream_queue.max(1));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown_signal = Arc::new(Notify::new());

        spawn_pool(
            "datagram",
            config.datagram_workers.max(1),
            datagram_rx,
            Arc::clone(&closed),
            Arc::clone(&shutdown_signal),
            {
                let handler = Arc::clone(&handler);
                move |datagram| {
                    let handler = Arc::clone(&handler);
                    async move { handler.handle_datagram(datagram).await }
                }
            },
        );

        spawn_pool(
            "stream",
            config.stream_workers.max(1),
            stream_rx,
            Arc::clone(&closed),
            Arc::clone(&shutdown_signal),
            {
                let handler = Arc::clone(&handler);
                move |job| {
                    let handler = Arc::clone(&handler);
                    async move { handler.handle_stream(job).await }
                }
            },
        );

        info!(
            senders = senders.len(),
            has_stream_client = stream_client.is_some(),
            "router started"
        );

        Arc::new(Self {
            senders,
            stream_client,
            network,
            datagram_tx,
            stream_tx,
            transports: Mutex::new(Vec::new()),
            closed,
            shutdown_signal,
        })
    }

    /// The address factory this router was built against.
    pub fn network(&self) -> &Arc<NetworkAddressFactory> {
        &self.network
    }

    /// Hand a receive loop to the router so shutdown stops it.
    pub fn register_transport(&self, transport: Arc<dyn Transport>) {
        self.lock_transports().push(transport);
    }

    /// Transmit one logical datagram on every bound address.
    ///
    /// Each copy carries the sending address's own hardware header when
    /// one is known. A failure on one address is logged and the rest
    /// continue.
    pub async fn send_datagram(&self, message: &UpnpMessage, destination: SocketAddr) {
        if self.is_closed() {
            debug!("router closed, dropping outbound datagram");
            return;
        }
        for sender in &self.senders {
            let bound = sender.bound_address();
            let mut copy = message.clone();
            if let Some(hardware) = &bound.hardware {
                copy.headers.set_typed(&HardwareAddressHeader(hardware.clone()));
            }
            let datagram = OutgoingDatagram::new(copy, destination);
            if let Err(e) = sender.send(&datagram).await {
                warn!(address = %bound.address, error = %e, "datagram send failed on one address");
            }
        }
    }

    /// One blocking HTTP exchange through the stream client.
    ///
    /// `None` when no client is configured (read-only router) or the
    /// exchange failed at transport level; callers map this to a
    /// protocol-level failure.
    pub async fn send_stream(&self, request: StreamRequest) -> Option<StreamResponse> {
        if self.is_closed() {
            return None;
        }
        match &self.stream_client {
            Some(client) => client.send_request(request).await,
            None => {
                debug!("no stream client configured, dropping outbound stream request");
                None
            }
        }
    }

    /// Submit an inbound datagram from a receive loop. Never blocks; on
    /// a full queue the datagram is discarded with a warning.
    pub fn received_datagram(&self, datagram: IncomingDatagram) {
        if self.is_closed() {
            return;
        }
        match self.datagram_tx.try_send(datagram) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("datagram dispatch queue full, discarding inbound datagram");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("datagram pool gone, discarding inbound datagram");
            }
        }
    }

    /// Submit an inbound stream exchange from a stream server. Same
    /// discard-on-saturation policy as datagrams; the dropped job's
    /// responder closes, releasing the server.
    pub fn received_stream(&self, job: StreamJob) {
        if self.is_closed() {
            return;
        }
        match self.stream_tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("stream dispatch queue full, discarding inbound exchange");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("stream pool gone, discarding inbound exchange");
            }
        }
    }

    /// Best-effort legacy broadcast, independent of multicast: raw bytes
    /// to each bound address's directed broadcast address.
    pub async fn broadcast(&self, payload: &[u8]) {
        if self.is_closed() {
            return;
        }
        for sender in &self.senders {
            let bound = sender.bound_address();
            let Some(broadcast) = bound.broadcast else {
                continue;
            };
            let destination = SocketAddr::from((broadcast, BROADCAST_PORT));
            if let Err(e) = sender.send_raw(payload, destination).await {
                warn!(address = %bound.address, error = %e, "broadcast send failed on one address");
            }
        }
    }

    /// Stop all owned transports and wind down the worker pools.
    /// Idempotent and safe to call concurrently with in-flight sends.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("router shutting down");
        let transports: Vec<Arc<dyn Transport>> = self.lock_transports().drain(..).collect();
        for transport in transports {
            transport.stop();
        }
        self.shutdown_signal.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_transports(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn Transport>>> {
        self.transports.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Spawn `count` workers draining one shared bounded queue.
fn spawn_pool<T, F, Fut>(
    pool: &'static str,
    count: usize,
    receiver: mpsc::Receiver<T>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    run: F,
) where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
    for worker in 0..count {
        let receiver = Arc::clone(&receiver);
        let closed = Arc::clone(&closed);
        let shutdown = Arc::clone(&shutdown);
        let run = run.clone();
        tokio::spawn(async move {
            loop {
                if closed.load(Ordering::SeqCst) {
                    break;
                }
                let next = tokio::select! {
                    _ = shutdown.notified() => None,
                    next = async { receiver.lock().await.recv().await } => next,
                };
                match next {
                    Some(work) => run(work).await,
                    None => break,
                }
            }
            debug!(pool, worker, "dispatch worker stopped");
        });
    }
}
