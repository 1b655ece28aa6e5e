//! Typed header values and their wire parse/format functions.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::error::MessageError;
use crate::header::{HeaderName, TypedHeader};
use crate::types::{DeviceType, ServiceType, Udn};

fn invalid(name: &HeaderName, value: &str) -> MessageError {
    MessageError::InvalidHeader {
        name: name.as_str().to_string(),
        value: value.to_string(),
    }
}

/// Discovery target carried by `ST` (searches) and `NT` (notifications).
///
/// `try_parse` runs the candidate forms in this declaration order:
/// all, root-device, UDN, device type, service type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchTarget {
    All,
    RootDevice,
    Udn(Udn),
    Device(DeviceType),
    Service(ServiceType),
}

impl SearchTarget {
    pub fn try_parse(raw: &str) -> Result<Self, MessageError> {
        let raw = raw.trim();
        if raw == "ssdp:all" {
            return Ok(SearchTarget::All);
        }
        if raw == "upnp:rootdevice" {
            return Ok(SearchTarget::RootDevice);
        }
        if let Ok(udn) = raw.parse::<Udn>() {
            return Ok(SearchTarget::Udn(udn));
        }
        if let Ok(device) = raw.parse::<DeviceType>() {
            return Ok(SearchTarget::Device(device));
        }
        if let Ok(service) = raw.parse::<ServiceType>() {
            return Ok(SearchTarget::Service(service));
        }
        Err(invalid(&HeaderName::St, raw))
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTarget::All => f.write_str("ssdp:all"),
            SearchTarget::RootDevice => f.write_str("upnp:rootdevice"),
            SearchTarget::Udn(udn) => write!(f, "{udn}"),
            SearchTarget::Device(device) => write!(f, "{device}"),
            SearchTarget::Service(service) => write!(f, "{service}"),
        }
    }
}

/// `ST` header on searches and search responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StHeader(pub SearchTarget);

impl TypedHeader for StHeader {
    fn name() -> HeaderName {
        HeaderName::St
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        SearchTarget::try_parse(raw).map(StHeader)
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}

/// `NT` header on SSDP notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationType(pub SearchTarget);

impl TypedHeader for NotificationType {
    fn name() -> HeaderName {
        HeaderName::Nt
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        SearchTarget::try_parse(raw).map(NotificationType)
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}

/// `NTS` header: alive or byebye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSubtype {
    Alive,
    Byebye,
}

impl TypedHeader for NotificationSubtype {
    fn name() -> HeaderName {
        HeaderName::Nts
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ssdp:alive" => Ok(NotificationSubtype::Alive),
            "ssdp:byebye" => Ok(NotificationSubtype::Byebye),
            _ => Err(invalid(&HeaderName::Nts, raw)),
        }
    }

    fn format(&self) -> String {
        match self {
            NotificationSubtype::Alive => "ssdp:alive".to_string(),
            NotificationSubtype::Byebye => "ssdp:byebye".to_string(),
        }
    }
}

/// `MAN: "ssdp:discover"`, the discovery indicator on searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManDiscover;

impl TypedHeader for ManDiscover {
    fn name() -> HeaderName {
        HeaderName::Man
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        if raw.trim() == "\"ssdp:discover\"" {
            Ok(ManDiscover)
        } else {
            Err(invalid(&HeaderName::Man, raw))
        }
    }

    fn format(&self) -> String {
        "\"ssdp:discover\"".to_string()
    }
}

/// `MX` header: maximum response delay in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mx(pub u32);

impl TypedHeader for Mx {
    fn name() -> HeaderName {
        HeaderName::Mx
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        raw.trim()
            .parse::<u32>()
            .map(Mx)
            .map_err(|_| invalid(&HeaderName::Mx, raw))
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}

/// `CACHE-CONTROL: max-age=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge(pub u32);

impl TypedHeader for MaxAge {
    fn name() -> HeaderName {
        HeaderName::CacheControl
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let lower = raw.to_ascii_lowercase();
        let idx = lower
            .find("max-age")
            .ok_or_else(|| invalid(&HeaderName::CacheControl, raw))?;
        let after = lower[idx + "max-age".len()..]
            .trim_start()
            .trim_start_matches('=')
            .trim_start();
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits
            .parse::<u32>()
            .map(MaxAge)
            .map_err(|_| invalid(&HeaderName::CacheControl, raw))
    }

    fn format(&self) -> String {
        format!("max-age={}", self.0)
    }
}

/// `LOCATION` header: the device description URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location(pub Url);

impl TypedHeader for Location {
    fn name() -> HeaderName {
        HeaderName::Location
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        Url::parse(raw.trim())
            .map(Location)
            .map_err(|_| invalid(&HeaderName::Location, raw))
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}

/// `SERVER` identity: `{os}/{os_version} UPnP/1.0 {product}/{product_version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHeader {
    pub os: String,
    pub os_version: String,
    pub product: String,
    pub product_version: String,
}

impl Default for ServerHeader {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            os_version: "1.0".to_string(),
            product: "upnp-stack".to_string(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TypedHeader for ServerHeader {
    fn name() -> HeaderName {
        HeaderName::Server
    }

    // Lenient: real devices put all sorts of things here. Take the first
    // and last slash-separated tokens and ignore the rest.
    fn parse(raw: &str) -> Result<Self, MessageError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(invalid(&HeaderName::Server, raw));
        }

        let split = |token: &str| -> (String, String) {
            match token.split_once('/') {
                Some((name, version)) => (name.to_string(), version.to_string()),
                None => (token.to_string(), String::new()),
            }
        };

        let (os, os_version) = split(tokens[0]);
        let (product, product_version) = split(tokens[tokens.len() - 1]);
        Ok(Self {
            os,
            os_version,
            product,
            product_version,
        })
    }

    fn format(&self) -> String {
        format!(
            "{}/{} UPnP/1.0 {}/{}",
            self.os, self.os_version, self.product, self.product_version
        )
    }
}

/// `USN` header: a UDN optionally qualified by a target suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueServiceName {
    pub udn: Udn,
    pub target: Option<SearchTarget>,
}

impl UniqueServiceName {
    pub fn device(udn: Udn) -> Self {
        Self { udn, target: None }
    }

    pub fn qualified(udn: Udn, target: SearchTarget) -> Self {
        Self {
            udn,
            target: Some(target),
        }
    }
}

impl TypedHeader for UniqueServiceName {
    fn name() -> HeaderName {
        HeaderName::Usn
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let raw = raw.trim();
        match raw.split_once("::") {
            Some((udn, suffix)) => Ok(Self {
                udn: udn.parse()?,
                target: Some(SearchTarget::try_parse(suffix)?),
            }),
            None => Ok(Self {
                udn: raw.parse()?,
                target: None,
            }),
        }
    }

    fn format(&self) -> String {
        match &self.target {
            Some(target) => format!("{}::{}", self.udn, target),
            None => self.udn.to_string(),
        }
    }
}

/// `NT: upnp:event` on GENA subscription requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtEvent;

impl TypedHeader for NtEvent {
    fn name() -> HeaderName {
        HeaderName::Nt
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        if raw.trim() == "upnp:event" {
            Ok(NtEvent)
        } else {
            Err(invalid(&HeaderName::Nt, raw))
        }
    }

    fn format(&self) -> String {
        "upnp:event".to_string()
    }
}

/// `CALLBACK` header: ordered delivery URL list, `<url1><url2>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackHeader(pub Vec<Url>);

impl TypedHeader for CallbackHeader {
    fn name() -> HeaderName {
        HeaderName::Callback
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let mut urls = Vec::new();
        let mut rest = raw.trim();
        while let Some(start) = rest.find('<') {
            let end = rest[start..]
                .find('>')
                .ok_or_else(|| invalid(&HeaderName::Callback, raw))?;
            let candidate = &rest[start + 1..start + end];
            let url =
                Url::parse(candidate).map_err(|_| invalid(&HeaderName::Callback, raw))?;
            urls.push(url);
            rest = &rest[start + end + 1..];
        }
        if urls.is_empty() {
            return Err(invalid(&HeaderName::Callback, raw));
        }
        Ok(CallbackHeader(urls))
    }

    fn format(&self) -> String {
        let mut out = String::new();
        for url in &self.0 {
            out.push('<');
            out.push_str(url.as_str());
            out.push('>');
        }
        out
    }
}

/// `SID` header: opaque subscription identifier, `uuid:` prefixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SidHeader(pub String);

impl TypedHeader for SidHeader {
    fn name() -> HeaderName {
        HeaderName::Sid
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let raw = raw.trim();
        if raw.starts_with("uuid:") && raw.len() > "uuid:".len() {
            Ok(SidHeader(raw.to_string()))
        } else {
            Err(invalid(&HeaderName::Sid, raw))
        }
    }

    fn format(&self) -> String {
        self.0.clone()
    }
}

/// `TIMEOUT` header: `Second-N` or `Second-infinite` (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutHeader(pub Option<u32>);

impl TypedHeader for TimeoutHeader {
    fn name() -> HeaderName {
        HeaderName::Timeout
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let lower = raw.trim().to_ascii_lowercase();
        let rest = lower
            .strip_prefix("second-")
            .ok_or_else(|| invalid(&HeaderName::Timeout, raw))?;
        if rest == "infinite" {
            return Ok(TimeoutHeader(None));
        }
        rest.parse::<u32>()
            .map(|seconds| TimeoutHeader(Some(seconds)))
            .map_err(|_| invalid(&HeaderName::Timeout, raw))
    }

    fn format(&self) -> String {
        match self.0 {
            Some(seconds) => format!("Second-{seconds}"),
            None => "Second-infinite".to_string(),
        }
    }
}

/// `SEQ` header: the event sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqHeader(pub u32);

impl TypedHeader for SeqHeader {
    fn name() -> HeaderName {
        HeaderName::Seq
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        raw.trim()
            .parse::<u32>()
            .map(SeqHeader)
            .map_err(|_| invalid(&HeaderName::Seq, raw))
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}

/// `X-HWADDR` extension: the sending interface's hardware address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareAddressHeader(pub String);

impl TypedHeader for HardwareAddressHeader {
    fn name() -> HeaderName {
        HeaderName::HardwareAddress
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid(&HeaderName::HardwareAddress, raw));
        }
        Ok(HardwareAddressHeader(raw.to_ascii_uppercase()))
    }

    fn format(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

/// `HOST` header: the multicast or unicast target address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostHeader(pub SocketAddr);

impl TypedHeader for HostHeader {
    fn name() -> HeaderName {
        HeaderName::Host
    }

    fn parse(raw: &str) -> Result<Self, MessageError> {
        raw.trim()
            .parse::<SocketAddr>()
            .map(HostHeader)
            .map_err(|_| invalid(&HeaderName::Host, raw))
    }

    fn format(&self) -> String {
        self.0.to_string()
    }
}
