//! M-SEARCH: sending searches, answering them, receiving answers.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;
use upnp_message::{
    Headers, HostHeader, IncomingDatagram, Location, ManDiscover, MaxAge, Method, Mx,
    SearchTarget, ServerHeader, StHeader, UniqueServiceName, UpnpMessage,
};
use upnp_message::HeaderName;
use upnp_model::DeviceLookup;
use upnp_router::Router;

use crate::advert::{tree_advertisements, Advertisement};
use crate::config::SsdpConfig;
use crate::listener::{DiscoveryListener, RemoteAnnouncement};

/// Multicasts an M-SEARCH for a target, repeated to compensate for UDP
/// loss.
pub struct SendingSearch {
    router: Arc<Router>,
    config: SsdpConfig,
}

impl SendingSearch {
    pub fn new(router: Arc<Router>, config: SsdpConfig) -> Self {
        Self { router, config }
    }

    pub async fn execute(&self, target: SearchTarget, mx_seconds: u32) {
        let network = self.router.network();
        let group = SocketAddr::from((network.multicast_group(), network.multicast_port()));

        let mut message = UpnpMessage::request(Method::MSearch, "*");
        message.headers.add_typed(&HostHeader(group));
        message.headers.add_typed(&ManDiscover);
        message.headers.add_typed(&Mx(mx_seconds));
        message.headers.add_typed(&StHeader(target.clone()));

        debug!(target = %target, mx = mx_seconds, "sending search");
        for round in 0..self.config.search_repeat {
            if round > 0 {
                tokio::time::sleep(self.config.search_interval).await;
            }
            self.router.send_datagram(&message, group).await;
        }
    }
}

/// Answers inbound M-SEARCH datagrams for the local device set.
pub struct ReceivingSearch {
    router: Arc<Router>,
    devices: Arc<dyn DeviceLookup>,
    config: SsdpConfig,
}

impl ReceivingSearch {
    pub fn new(router: Arc<Router>, devices: Arc<dyn DeviceLookup>, config: SsdpConfig) -> Self {
        Self {
            router,
            devices,
            config,
        }
    }

    /// Validate, wait out the MX jitter, then unicast one response per
    /// matching advertisement. Invalid searches are dropped without a
    /// reply.
    pub async fn handle(&self, datagram: IncomingDatagram) {
        let headers = &datagram.message.headers;

        if headers.typed::<ManDiscover>().is_none() {
            debug!(source = %datagram.source, "search without MAN discover, dropping");
            return;
        }
        let Some(StHeader(target)) = headers.typed::<StHeader>() else {
            debug!(source = %datagram.source, "search without usable ST, dropping");
            return;
        };
        let IpAddr::V4(local) = datagram.local_address else {
            return;
        };

        let adverts = self.matching_advertisements(&target);
        if adverts.is_empty() {
            return;
        }

        // Spread responses over the searcher's MX window so a burst of
        // devices does not answer in lockstep.
        let mx = resolve_mx(headers, &self.config);
        if mx > 0 {
            let delay_ms = rand::rng().random_range(0..u64::from(mx) * 1000);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        debug!(
            source = %datagram.source,
            target = %target,
            responses = adverts.len(),
            "answering search"
        );
        for advert in &adverts {
            if let Some(response) = self.search_response(advert, local) {
                self.router.send_datagram(&response, datagram.source).await;
            }
        }
    }

    /// Advertisements answering `target`, across all local root trees.
    fn matching_advertisements(&self, target: &SearchTarget) -> Vec<Advertisement> {
        let all: Vec<Advertisement> = self
            .devices
            .local_devices()
            .iter()
            .flat_map(tree_advertisements)
            .collect();
        match target {
            SearchTarget::All => all,
            other => all
                .into_iter()
                .filter(|advert| advert.target == *other)
                .collect(),
        }
    }

    fn search_response(
        &self,
        advert: &Advertisement,
        local: std::net::Ipv4Addr,
    ) -> Option<UpnpMessage> {
        let port = self.router.network().stream_listen_port();
        let location = url::Url::parse(&format!(
            "http://{local}:{port}{}",
            advert.device.descriptor_path
        ))
        .ok()?;

        let mut message = UpnpMessage::ok();
        let headers = &mut message.headers;
        headers.add_typed(&MaxAge(self.config.max_age_seconds));
        headers.add(HeaderName::Date, httpdate_now());
        headers.add(HeaderName::Ext, "");
        headers.add_typed(&Location(location));
        headers.add_typed(&ServerHeader::default());
        headers.add_typed(&StHeader(advert.target.clone()));
        headers.add_typed(&advert.usn);
        Some(message)
    }
}

/// Feeds search responses addressed to us into the registry.
pub struct ReceivingSearchResponse {
    listener: Arc<dyn DiscoveryListener>,
}

impl ReceivingSearchResponse {
    pub fn new(listener: Arc<dyn DiscoveryListener>) -> Self {
        Self { listener }
    }

    pub fn handle(&self, datagram: &IncomingDatagram) {
        let headers = &datagram.message.headers;
        let Some(usn) = headers.typed::<UniqueServiceName>() else {
            debug!(source = %datagram.source, "search response without usable USN, dropping");
            return;
        };
        let Some(StHeader(target)) = headers.typed::<StHeader>() else {
            debug!(source = %datagram.source, "search response without usable ST, dropping");
            return;
        };

        let announcement = RemoteAnnouncement::from_datagram(datagram, usn, target);
        self.listener.search_response_received(&announcement);
    }
}

/// The effective MX: the searcher's value when present and within range,
/// the default otherwise.
fn resolve_mx(headers: &Headers, config: &SsdpConfig) -> u32 {
    match headers.typed::<Mx>() {
        Some(Mx(mx)) if mx <= config.max_mx_seconds => mx,
        Some(Mx(mx)) => {
            debug!(mx, "MX out of range, using default");
            config.default_mx_seconds
        }
        None => config.default_mx_seconds,
    }
}

/// RFC 1123 date, as HTTP wants it.
fn httpdate_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{incoming_search, recording_router, test_devices};
    use upnp_message::TypedHeader;

    #[test]
    fn test_resolve_mx_clamps_oversized_values() {
        let config = SsdpConfig::default();

        let mut headers = Headers::new();
        headers.add_typed(&Mx(5));
        assert_eq!(resolve_mx(&headers, &config), 5);

        let mut headers = Headers::new();
        headers.add_typed(&Mx(121));
        assert_eq!(resolve_mx(&headers, &config), config.default_mx_seconds);

        let mut headers = Headers::new();
        headers.add_typed(&Mx(120));
        assert_eq!(resolve_mx(&headers, &config), 120);

        assert_eq!(
            resolve_mx(&Headers::new(), &config),
            config.default_mx_seconds
        );
    }

    #[tokio::test]
    async fn test_sending_search_repeats() {
        let (router, sender) = recording_router();
        let search = SendingSearch::new(router, SsdpConfig::default());

        search.execute(SearchTarget::All, 3).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        let first = &sent[0].message;
        assert_eq!(first.headers.first(&HeaderName::Man), Some("\"ssdp:discover\""));
        assert_eq!(first.headers.first(&HeaderName::Mx), Some("3"));
        assert_eq!(first.headers.first(&HeaderName::St), Some("ssdp:all"));
        assert_eq!(sent[0].destination, "239.255.255.250:1900".parse().unwrap());
    }

    #[tokio::test]
    async fn test_search_without_man_is_dropped() {
        let (router, sender) = recording_router();
        let receiving = ReceivingSearch::new(router, test_devices(), SsdpConfig::default());

        let mut datagram = incoming_search("upnp:rootdevice", 0);
        datagram.message.headers.remove(&HeaderName::Man);
        receiving.handle(datagram).await;

        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_search_with_garbage_st_is_dropped() {
        let (router, sender) = recording_router();
        let receiving = ReceivingSearch::new(router, test_devices(), SsdpConfig::default());

        receiving.handle(incoming_search("nonsense-target", 0)).await;
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_root_device_search_gets_one_response_per_root() {
        let (router, sender) = recording_router();
        let receiving = ReceivingSearch::new(router, test_devices(), SsdpConfig::default());

        receiving.handle(incoming_search("upnp:rootdevice", 0)).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        let response = &sent[0].message;
        assert_eq!(response.operation.status(), Some(200));
        assert_eq!(response.headers.first(&HeaderName::St), Some("upnp:rootdevice"));
        assert_eq!(
            response.headers.first(&HeaderName::Usn),
            Some("uuid:root-1::upnp:rootdevice")
        );
        assert_eq!(
            response.headers.first(&HeaderName::Location),
            Some("http://192.168.1.10:3400/desc/root-1.xml")
        );
        assert_eq!(response.headers.first(&HeaderName::CacheControl), Some("max-age=1800"));
        assert_eq!(response.headers.first(&HeaderName::Ext), Some(""));
        assert!(response.headers.contains(&HeaderName::Date));
        assert!(response.headers.contains(&HeaderName::Server));
        // Responses go to the searcher, not the group
        assert_eq!(sent[0].destination, "192.168.1.50:50000".parse().unwrap());
    }

    #[tokio::test]
    async fn test_all_search_gets_full_advertisement_set() {
        let (router, sender) = recording_router();
        let receiving = ReceivingSearch::new(router, test_devices(), SsdpConfig::default());

        receiving.handle(incoming_search("ssdp:all", 0)).await;

        // root marker + udn + device type + service type, then embedded
        // udn + device type
        assert_eq!(sender.sent().len(), 6);
    }

    #[tokio::test]
    async fn test_embedded_udn_search_answers_without_root_marker() {
        let (router, sender) = recording_router();
        let receiving = ReceivingSearch::new(router, test_devices(), SsdpConfig::default());

        receiving.handle(incoming_search("uuid:embedded-1", 0)).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].message.headers.first(&HeaderName::Usn),
            Some("uuid:embedded-1")
        );
        // The embedded device has its own description URL
        assert_eq!(
            sent[0].message.headers.first(&HeaderName::Location),
            Some("http://192.168.1.10:3400/desc/embedded-1.xml")
        );
    }

    #[tokio::test]
    async fn test_search_response_feeds_listener() {
        use crate::testing::CollectingListener;

        let listener = Arc::new(CollectingListener::default());
        let receiving = ReceivingSearchResponse::new(listener.clone());

        let mut message = UpnpMessage::ok();
        message.headers.add(HeaderName::St, "upnp:rootdevice");
        message.headers.add(HeaderName::Usn, "uuid:remote-1::upnp:rootdevice");
        message
            .headers
            .add(HeaderName::Location, "http://192.168.1.60:8080/desc.xml");
        message.headers.add(HeaderName::CacheControl, "max-age=900");

        receiving.handle(&IncomingDatagram {
            message,
            source: "192.168.1.60:1900".parse().unwrap(),
            local_address: "192.168.1.10".parse().unwrap(),
        });

        let responses = listener.search_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].usn.format(), "uuid:remote-1::upnp:rootdevice");
        assert_eq!(responses[0].max_age, Some(900));
        assert!(responses[0].is_complete());
    }

    #[tokio::test]
    async fn test_search_response_without_usn_is_dropped() {
        use crate::testing::CollectingListener;

        let listener = Arc::new(CollectingListener::default());
        let receiving = ReceivingSearchResponse::new(listener.clone());

        let mut message = UpnpMessage::ok();
        message.headers.add(HeaderName::St, "upnp:rootdevice");

        receiving.handle(&IncomingDatagram {
            message,
            source: "192.168.1.60:1900".parse().unwrap(),
            local_address: "192.168.1.10".parse().unwrap(),
        });

        assert!(listener.search_responses().is_empty());
    }
}
