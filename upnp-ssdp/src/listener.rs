//! What inbound discovery traffic boils down to for the registry.

use std::net::{IpAddr, SocketAddr};

use upnp_message::{
    HardwareAddressHeader, IncomingDatagram, Location, MaxAge, SearchTarget, ServerHeader,
    UniqueServiceName,
};

/// A remote device's presence, distilled from an alive notification or
/// a search response.
#[derive(Debug, Clone)]
pub struct RemoteAnnouncement {
    pub usn: UniqueServiceName,
    pub target: SearchTarget,
    /// Description URL; absent announcements cannot be acted on but are
    /// still surfaced for diagnostics.
    pub location: Option<url::Url>,
    pub max_age: Option<u32>,
    pub server: Option<ServerHeader>,
    pub hardware: Option<String>,
    pub source: SocketAddr,
    /// Local address the datagram arrived on.
    pub local_address: IpAddr,
}

impl RemoteAnnouncement {
    /// Pull the descriptive headers shared by alive notifications and
    /// search responses out of a datagram.
    pub(crate) fn from_datagram(
        datagram: &IncomingDatagram,
        usn: UniqueServiceName,
        target: SearchTarget,
    ) -> Self {
        let headers = &datagram.message.headers;
        Self {
            usn,
            target,
            location: headers.typed::<Location>().map(|l| l.0),
            max_age: headers.typed::<MaxAge>().map(|m| m.0),
            server: headers.typed::<ServerHeader>(),
            hardware: headers.typed::<HardwareAddressHeader>().map(|h| h.0),
            source: datagram.source,
            local_address: datagram.local_address,
        }
    }

    /// Whether the announcement carries enough to track the device.
    pub fn is_complete(&self) -> bool {
        self.location.is_some() && self.max_age.is_some()
    }
}

/// Receives distilled discovery traffic. Implemented by the registry;
/// all methods default to no-ops so implementors subscribe to what they
/// need.
pub trait DiscoveryListener: Send + Sync {
    /// A device announced or re-announced itself.
    fn alive_received(&self, announcement: &RemoteAnnouncement) {
        let _ = announcement;
    }

    /// A device announced its departure.
    fn byebye_received(&self, usn: &UniqueServiceName) {
        let _ = usn;
    }

    /// A device answered one of our searches.
    fn search_response_received(&self, announcement: &RemoteAnnouncement) {
        let _ = announcement;
    }
}
