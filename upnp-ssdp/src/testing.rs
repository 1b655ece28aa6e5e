//! Shared test doubles for the protocol tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use upnp_message::{
    HeaderName, IncomingDatagram, Method, OutgoingDatagram, UniqueServiceName, UpnpMessage,
};
use upnp_model::{DeviceLookup, LocalDevice, LocalService, StateVariable, StaticDeviceLookup};
use upnp_network::{BoundAddress, NetworkAddressFactory, NetworkConfig};
use upnp_router::{DatagramIo, ProtocolHandler, Router, RouterConfig, StreamJob};

use crate::listener::{DiscoveryListener, RemoteAnnouncement};

pub struct RecordingSender {
    bound: BoundAddress,
    sent: Mutex<Vec<OutgoingDatagram>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<OutgoingDatagram> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatagramIo for RecordingSender {
    fn bound_address(&self) -> &BoundAddress {
        &self.bound
    }

    async fn send(&self, datagram: &OutgoingDatagram) -> upnp_router::Result<()> {
        self.sent.lock().unwrap().push(datagram.clone());
        Ok(())
    }

    async fn send_raw(&self, _payload: &[u8], _destination: SocketAddr) -> upnp_router::Result<()> {
        Ok(())
    }
}

struct NoopHandler;

#[async_trait]
impl ProtocolHandler for NoopHandler {
    async fn handle_datagram(&self, _datagram: IncomingDatagram) {}

    async fn handle_stream(&self, job: StreamJob) {
        job.respond(UpnpMessage::ok());
    }
}

/// A router bound to 192.168.1.10 with one recording sender.
pub fn recording_router() -> (Arc<Router>, Arc<RecordingSender>) {
    let bound = BoundAddress {
        interface: "test0".to_string(),
        address: Ipv4Addr::new(192, 168, 1, 10),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        broadcast: Some(Ipv4Addr::new(192, 168, 1, 255)),
        hardware: Some("AA:BB:CC:00:11:22".to_string()),
    };
    let network = Arc::new(
        NetworkAddressFactory::with_addresses(NetworkConfig::default(), vec![bound.clone()])
            .unwrap(),
    );
    let sender = Arc::new(RecordingSender {
        bound,
        sent: Mutex::new(Vec::new()),
    });
    let router = Router::new(
        RouterConfig::default(),
        network,
        vec![sender.clone()],
        None,
        Arc::new(NoopHandler),
    );
    (router, sender)
}

/// A root device with one service plus one embedded device.
pub fn test_devices() -> Arc<dyn DeviceLookup> {
    let service = Arc::new(LocalService::new(
        upnp_message::ServiceType::upnp_org("SwitchPower", 1),
        "urn:upnp-org:serviceId:SwitchPower",
        vec![StateVariable::boolean("Status")],
    ));
    let embedded = Arc::new(LocalDevice::new(
        upnp_message::Udn::new("embedded-1"),
        upnp_message::DeviceType::upnp_org("DimmableLight", 1),
        "Dimmer",
    ));
    let root = Arc::new(
        LocalDevice::new(
            upnp_message::Udn::new("root-1"),
            upnp_message::DeviceType::upnp_org("BinaryLight", 1),
            "Light",
        )
        .with_service(service)
        .with_embedded(embedded),
    );
    Arc::new(StaticDeviceLookup::new(vec![root]))
}

/// An M-SEARCH from 192.168.1.50 with the given raw ST value.
pub fn incoming_search(st: &str, mx: u32) -> IncomingDatagram {
    let mut message = UpnpMessage::request(Method::MSearch, "*");
    message.headers.add(HeaderName::Host, "239.255.255.250:1900");
    message.headers.add(HeaderName::Man, "\"ssdp:discover\"");
    message.headers.add(HeaderName::Mx, mx.to_string());
    message.headers.add(HeaderName::St, st);
    IncomingDatagram {
        message,
        source: "192.168.1.50:50000".parse().unwrap(),
        local_address: "192.168.1.10".parse().unwrap(),
    }
}

/// Collects everything the discovery side reports.
#[derive(Default)]
pub struct CollectingListener {
    alive: Mutex<Vec<RemoteAnnouncement>>,
    byebye: Mutex<Vec<UniqueServiceName>>,
    responses: Mutex<Vec<RemoteAnnouncement>>,
}

impl CollectingListener {
    pub fn alive(&self) -> Vec<RemoteAnnouncement> {
        self.alive.lock().unwrap().clone()
    }

    pub fn byebyes(&self) -> Vec<UniqueServiceName> {
        self.byebye.lock().unwrap().clone()
    }

    pub fn search_responses(&self) -> Vec<RemoteAnnouncement> {
        self.responses.lock().unwrap().clone()
    }
}

impl DiscoveryListener for CollectingListener {
    fn alive_received(&self, announcement: &RemoteAnnouncement) {
        self.alive.lock().unwrap().push(announcement.clone());
    }

    fn byebye_received(&self, usn: &UniqueServiceName) {
        self.byebye.lock().unwrap().push(usn.clone());
    }

    fn search_response_received(&self, announcement: &RemoteAnnouncement) {
        self.responses.lock().unwrap().push(announcement.clone());
    }
}
