//! Identity types shared between the wire layer and the device model.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageError;

/// Unique Device Name, e.g. `uuid:9f0865b3-f5da-4ad5-85b7-7404637fdf37`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Udn(String);

impl Udn {
    /// Wrap an identifier, adding the `uuid:` prefix when it is missing.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.starts_with("uuid:") {
            Self(id)
        } else {
            Self(format!("uuid:{id}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Udn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Udn {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("uuid:") && s.len() > "uuid:".len() {
            Ok(Self(s.to_string()))
        } else {
            Err(MessageError::InvalidHeader {
                name: "UDN".to_string(),
                value: s.to_string(),
            })
        }
    }
}

/// Fully qualified device type: `urn:{domain}:device:{kind}:{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceType {
    pub domain: String,
    pub kind: String,
    pub version: u32,
}

impl DeviceType {
    /// Device type in the standard `schemas-upnp-org` domain.
    pub fn upnp_org(kind: impl Into<String>, version: u32) -> Self {
        Self {
            domain: "schemas-upnp-org".to_string(),
            kind: kind.into(),
            version,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:device:{}:{}", self.domain, self.kind, self.version)
    }
}

impl FromStr for DeviceType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_urn(s, "device").map(|(domain, kind, version)| Self {
            domain,
            kind,
            version,
        })
    }
}

/// Fully qualified service type: `urn:{domain}:service:{kind}:{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    pub domain: String,
    pub kind: String,
    pub version: u32,
}

impl ServiceType {
    /// Service type in the standard `schemas-upnp-org` domain.
    pub fn upnp_org(kind: impl Into<String>, version: u32) -> Self {
        Self {
            domain: "schemas-upnp-org".to_string(),
            kind: kind.into(),
            version,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:service:{}:{}", self.domain, self.kind, self.version)
    }
}

impl FromStr for ServiceType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_urn(s, "service").map(|(domain, kind, version)| Self {
            domain,
            kind,
            version,
        })
    }
}

/// Parse `urn:{domain}:{category}:{kind}:{version}` with a fixed category.
fn parse_urn(s: &str, category: &str) -> Result<(String, String, u32), MessageError> {
    let invalid = || MessageError::InvalidHeader {
        name: category.to_uppercase(),
        value: s.to_string(),
    };

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 5 || parts[0] != "urn" || parts[2] != category {
        return Err(invalid());
    }

    let version: u32 = parts[4].parse().map_err(|_| invalid())?;
    if parts[1].is_empty() || parts[3].is_empty() {
        return Err(invalid());
    }

    Ok((parts[1].to_string(), parts[3].to_string(), version))
}
