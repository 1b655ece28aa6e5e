//! Local devices and the narrow registry lookup contract.

use std::sync::Arc;

use upnp_message::{DeviceType, SearchTarget, ServiceType, Udn};

use crate::service::LocalService;

/// An in-process UPnP device, possibly with embedded devices.
///
/// Storage, expiry and remote-device bookkeeping live in the registry,
/// behind [`DeviceLookup`]; this type only carries what discovery and
/// eventing need to advertise and serve the device.
#[derive(Debug)]
pub struct LocalDevice {
    pub udn: Udn,
    pub device_type: DeviceType,
    pub friendly_name: String,
    pub services: Vec<Arc<LocalService>>,
    pub embedded: Vec<Arc<LocalDevice>>,
    /// Path of the description document on the local stream server
    pub descriptor_path: String,
}

impl LocalDevice {
    pub fn new(udn: Udn, device_type: DeviceType, friendly_name: impl Into<String>) -> Self {
        let descriptor_path = format!("/desc/{}.xml", udn.as_str().trim_start_matches("uuid:"));
        Self {
            udn,
            device_type,
            friendly_name: friendly_name.into(),
            services: Vec::new(),
            embedded: Vec::new(),
            descriptor_path,
        }
    }

    pub fn with_service(mut self, service: Arc<LocalService>) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_embedded(mut self, device: Arc<LocalDevice>) -> Self {
        self.embedded.push(device);
        self
    }

    /// This device plus all embedded devices, depth first.
    pub fn flatten(self: &Arc<Self>) -> Vec<Arc<LocalDevice>> {
        let mut devices = vec![Arc::clone(self)];
        for embedded in &self.embedded {
            devices.extend(embedded.flatten());
        }
        devices
    }

    /// Distinct service types exposed by this device (not embedded ones).
    pub fn service_types(&self) -> Vec<ServiceType> {
        let mut types = Vec::new();
        for service in &self.services {
            if !types.contains(service.service_type()) {
                types.push(service.service_type().clone());
            }
        }
        types
    }

    /// Whether this single device (not its embedded tree) answers for
    /// the given search target.
    pub fn matches(&self, target: &SearchTarget) -> bool {
        match target {
            SearchTarget::All => true,
            // Only the registry knows which devices are roots; root
            // matching is handled a level up.
            SearchTarget::RootDevice => false,
            SearchTarget::Udn(udn) => self.udn == *udn,
            SearchTarget::Device(device_type) => self.device_type == *device_type,
            SearchTarget::Service(service_type) => self
                .services
                .iter()
                .any(|service| service.service_type() == service_type),
        }
    }
}

/// The narrow lookup interface the protocols see the device registry
/// through. Returned devices are roots; use [`LocalDevice::flatten`] to
/// reach embedded devices.
pub trait DeviceLookup: Send + Sync {
    fn local_devices(&self) -> Vec<Arc<LocalDevice>>;
    fn device_by_udn(&self, udn: &Udn) -> Option<Arc<LocalDevice>>;
}

/// A fixed in-memory device set, sufficient for servers that declare
/// their devices at startup (and for tests).
#[derive(Default)]
pub struct StaticDeviceLookup {
    roots: Vec<Arc<LocalDevice>>,
}

impl StaticDeviceLookup {
    pub fn new(roots: Vec<Arc<LocalDevice>>) -> Self {
        Self { roots }
    }
}

impl DeviceLookup for StaticDeviceLookup {
    fn local_devices(&self) -> Vec<Arc<LocalDevice>> {
        self.roots.clone()
    }

    fn device_by_udn(&self, udn: &Udn) -> Option<Arc<LocalDevice>> {
        self.roots
            .iter()
            .flat_map(|root| root.flatten())
            .find(|device| device.udn == *udn)
    }
}
