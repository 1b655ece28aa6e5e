//! Protocol dispatch: one handler behind the router's worker pools.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::debug;
use upnp_gena::{CallbackRoutes, EventBodyProcessor};
use upnp_message::{IncomingDatagram, Method, Operation, UpnpMessage};
use upnp_model::DeviceLookup;
use upnp_router::{ProtocolHandler, Router, StreamJob};
use upnp_ssdp::{
    DiscoveryListener, ReceivingNotification, ReceivingSearch, ReceivingSearchResponse,
    SsdpConfig,
};

/// Routes inbound traffic to the protocol that owns it.
///
/// Datagrams: M-SEARCH requests go to the search responder, NOTIFY
/// requests to the notification receiver, responses to the
/// search-response receiver. Stream exchanges: NOTIFY goes to GENA
/// callback routing, anything else is answered `405`. Unroutable
/// datagrams are dropped with a debug log, never an error.
///
/// The search responder needs the router to send with, and the router
/// needs this handler at construction; `attach_router` closes the loop
/// once after both exist.
pub struct ProtocolDispatcher {
    devices: Arc<dyn DeviceLookup>,
    config: SsdpConfig,
    search: OnceLock<ReceivingSearch>,
    notifications: ReceivingNotification,
    search_responses: ReceivingSearchResponse,
    routes: Arc<CallbackRoutes>,
    body_processor: Arc<dyn EventBodyProcessor>,
}

impl ProtocolDispatcher {
    pub fn new(
        devices: Arc<dyn DeviceLookup>,
        discovery: Arc<dyn DiscoveryListener>,
        routes: Arc<CallbackRoutes>,
        body_processor: Arc<dyn EventBodyProcessor>,
        config: SsdpConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            devices,
            config,
            search: OnceLock::new(),
            notifications: ReceivingNotification::new(Arc::clone(&discovery)),
            search_responses: ReceivingSearchResponse::new(discovery),
            routes,
            body_processor,
        })
    }

    /// Wire in the router. Must happen before traffic flows; datagrams
    /// arriving earlier are search-dropped.
    pub fn attach_router(&self, router: Arc<Router>) {
        let _ = self.search.set(ReceivingSearch::new(
            router,
            Arc::clone(&self.devices),
            self.config.clone(),
        ));
    }
}

#[async_trait]
impl ProtocolHandler for ProtocolDispatcher {
    async fn handle_datagram(&self, datagram: IncomingDatagram) {
        match &datagram.message.operation {
            Operation::Request {
                method: Method::MSearch,
                ..
            } => {
                if let Some(search) = self.search.get() {
                    search.handle(datagram).await;
                }
            }
            Operation::Request {
                method: Method::Notify,
                ..
            } => self.notifications.handle(&datagram),
            Operation::Response { .. } => self.search_responses.handle(&datagram),
            Operation::Request { method, .. } => {
                debug!(method = method.as_str(), source = %datagram.source, "unroutable datagram, dropping");
            }
        }
    }

    async fn handle_stream(&self, job: StreamJob) {
        match job.request.operation.method() {
            Some(Method::Notify) => {
                let response = self.routes.handle(&job.request, &*self.body_processor);
                job.respond(response);
            }
            _ => {
                debug!(peer = %job.peer, "unsupported stream method");
                job.respond(UpnpMessage::response(405, "Method Not Allowed"));
            }
        }
    }
}
