//! Multicast NOTIFY: presence announcements, out and in.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info};
use upnp_message::{
    HostHeader, IncomingDatagram, Location, MaxAge, Method, NotificationSubtype,
    NotificationType, ServerHeader, UniqueServiceName, UpnpMessage,
};
use upnp_model::DeviceLookup;
use upnp_network::BoundAddress;
use upnp_router::Router;

use crate::advert::tree_advertisements;
use crate::config::SsdpConfig;
use crate::listener::{DiscoveryListener, RemoteAnnouncement};

/// Announces the local device set to the multicast group.
///
/// One message per advertisement per bound address: each bound address
/// contributes its own LOCATION variant, and the router then transmits
/// every variant on every interface. The whole bulk is repeated to
/// compensate for UDP loss.
pub struct SendingNotification {
    router: Arc<Router>,
    devices: Arc<dyn DeviceLookup>,
    config: SsdpConfig,
}

impl SendingNotification {
    pub fn new(router: Arc<Router>, devices: Arc<dyn DeviceLookup>, config: SsdpConfig) -> Self {
        Self {
            router,
            devices,
            config,
        }
    }

    /// Announce presence (startup and periodic re-announcement).
    pub async fn alive(&self) {
        let messages = self.build_messages(NotificationSubtype::Alive);
        info!(messages = messages.len(), "sending alive notifications");
        self.send_bulk(&messages).await;
    }

    /// Announce departure (shutdown).
    pub async fn byebye(&self) {
        let messages = self.build_messages(NotificationSubtype::Byebye);
        info!(messages = messages.len(), "sending byebye notifications");
        self.send_bulk(&messages).await;
    }

    async fn send_bulk(&self, messages: &[UpnpMessage]) {
        let network = self.router.network();
        let group = SocketAddr::from((network.multicast_group(), network.multicast_port()));

        for round in 0..self.config.notify_repeat {
            if round > 0 {
                tokio::time::sleep(self.config.notify_interval).await;
            }
            for message in messages {
                self.router.send_datagram(message, group).await;
            }
        }
    }

    fn build_messages(&self, subtype: NotificationSubtype) -> Vec<UpnpMessage> {
        let mut messages = Vec::new();
        for bound in self.router.network().bind_addresses() {
            for root in self.devices.local_devices() {
                for advert in tree_advertisements(&root) {
                    messages.push(self.notification(
                        bound,
                        subtype,
                        advert.target.clone(),
                        advert.usn.clone(),
                        &advert.device.descriptor_path,
                    ));
                }
            }
        }
        messages
    }

    fn notification(
        &self,
        bound: &BoundAddress,
        subtype: NotificationSubtype,
        target: upnp_message::SearchTarget,
        usn: UniqueServiceName,
        descriptor_path: &str,
    ) -> UpnpMessage {
        let network = self.router.network();
        let group = SocketAddr::from((network.multicast_group(), network.multicast_port()));

        let mut message = UpnpMessage::request(Method::Notify, "*");
        let headers = &mut message.headers;
        headers.add_typed(&HostHeader(group));
        if subtype == NotificationSubtype::Alive {
            headers.add_typed(&MaxAge(self.config.max_age_seconds));
            if let Ok(location) = url::Url::parse(&format!(
                "http://{}:{}{}",
                bound.address,
                network.stream_listen_port(),
                descriptor_path
            )) {
                headers.add_typed(&Location(location));
            }
            headers.add_typed(&ServerHeader::default());
        }
        headers.add_typed(&NotificationType(target));
        headers.add_typed(&subtype);
        headers.add_typed(&usn);
        message
    }
}

/// Feeds inbound multicast notifications into the registry.
pub struct ReceivingNotification {
    listener: Arc<dyn DiscoveryListener>,
}

impl ReceivingNotification {
    pub fn new(listener: Arc<dyn DiscoveryListener>) -> Self {
        Self { listener }
    }

    pub fn handle(&self, datagram: &IncomingDatagram) {
        let headers = &datagram.message.headers;

        let Some(NotificationType(target)) = headers.typed::<NotificationType>() else {
            debug!(source = %datagram.source, "notification without usable NT, dropping");
            return;
        };
        let Some(usn) = headers.typed::<UniqueServiceName>() else {
            debug!(source = %datagram.source, "notification without usable USN, dropping");
            return;
        };
        let Some(subtype) = headers.typed::<NotificationSubtype>() else {
            debug!(source = %datagram.source, "notification without usable NTS, dropping");
            return;
        };

        match subtype {
            NotificationSubtype::Alive => {
                let announcement = RemoteAnnouncement::from_datagram(datagram, usn, target);
                self.listener.alive_received(&announcement);
            }
            NotificationSubtype::Byebye => {
                self.listener.byebye_received(&usn);
            }
        }
    }
}
