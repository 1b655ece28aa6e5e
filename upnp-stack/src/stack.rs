//! The assembled stack: router, dispatcher and protocols wired together.

use std::sync::Arc;

use tracing::info;
use upnp_gena::{
    CallbackRoutes, EventBodyProcessor, SubscriptionCallback, SubscriptionListener,
    SubscriptionTarget,
};
use upnp_message::SearchTarget;
use upnp_model::DeviceLookup;
use upnp_network::NetworkAddressFactory;
use upnp_router::{DatagramIo, ProtocolHandler, Router, RouterConfig, StreamClient};
use upnp_ssdp::{DiscoveryListener, SendingNotification, SendingSearch, SsdpConfig};

use crate::dispatcher::ProtocolDispatcher;

/// Everything an embedder supplies to assemble a stack. The socket
/// transports and the registry/XML collaborators stay outside.
pub struct StackParts {
    pub network: Arc<NetworkAddressFactory>,
    pub senders: Vec<Arc<dyn DatagramIo>>,
    pub stream_client: Option<Arc<dyn StreamClient>>,
    pub devices: Arc<dyn DeviceLookup>,
    pub discovery: Arc<dyn DiscoveryListener>,
    pub body_processor: Arc<dyn EventBodyProcessor>,
}

/// The assembled engine. Owns the router and the outbound protocols;
/// inbound traffic flows through the dispatcher installed as the
/// router's protocol handler.
pub struct UpnpStack {
    router: Arc<Router>,
    routes: Arc<CallbackRoutes>,
    search: SendingSearch,
    notification: SendingNotification,
}

impl UpnpStack {
    pub fn new(parts: StackParts, router_config: RouterConfig, ssdp_config: SsdpConfig) -> Self {
        let routes = Arc::new(CallbackRoutes::new());
        let dispatcher = ProtocolDispatcher::new(
            Arc::clone(&parts.devices),
            parts.discovery,
            Arc::clone(&routes),
            parts.body_processor,
            ssdp_config.clone(),
        );
        let router = Router::new(
            router_config,
            parts.network,
            parts.senders,
            parts.stream_client,
            Arc::clone(&dispatcher) as Arc<dyn ProtocolHandler>,
        );
        dispatcher.attach_router(Arc::clone(&router));

        let search = SendingSearch::new(Arc::clone(&router), ssdp_config.clone());
        let notification =
            SendingNotification::new(Arc::clone(&router), parts.devices, ssdp_config);

        info!("upnp stack assembled");
        Self {
            router,
            routes,
            search,
            notification,
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn routes(&self) -> &Arc<CallbackRoutes> {
        &self.routes
    }

    /// Multicast a search for `target`.
    pub async fn search(&self, target: SearchTarget, mx_seconds: u32) {
        self.search.execute(target, mx_seconds).await;
    }

    /// Announce the local device set (startup, periodic refresh).
    pub async fn announce(&self) {
        self.notification.alive().await;
    }

    /// Subscribe to a local or remote service.
    pub async fn subscribe(
        &self,
        target: SubscriptionTarget,
        listener: Arc<dyn SubscriptionListener>,
    ) -> upnp_gena::Result<SubscriptionCallback> {
        let callback = SubscriptionCallback::new(target, listener);
        callback.run(&self.router, &self.routes).await?;
        Ok(callback)
    }

    pub fn unsubscribe(&self, callback: &SubscriptionCallback) {
        callback.end(&self.routes);
    }

    /// Announce departure, then stop the router. Safe to call once the
    /// embedder is done; further sends become no-ops.
    pub async fn shutdown(&self) {
        self.notification.byebye().await;
        self.router.shutdown();
    }
}
