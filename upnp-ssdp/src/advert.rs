//! The advertisement set of a local device tree.

use std::sync::Arc;

use upnp_message::{SearchTarget, UniqueServiceName};
use upnp_model::LocalDevice;

/// One (NT/ST, USN) pair a device advertises, tied to the device whose
/// description URL the message must point at.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub target: SearchTarget,
    pub usn: UniqueServiceName,
    pub device: Arc<LocalDevice>,
}

impl Advertisement {
    fn new(target: SearchTarget, usn: UniqueServiceName, device: &Arc<LocalDevice>) -> Self {
        Self {
            target,
            usn,
            device: Arc::clone(device),
        }
    }
}

/// Everything one device advertises: root marker (roots only), its UDN,
/// its device type, and one entry per distinct service type.
pub fn device_advertisements(device: &Arc<LocalDevice>, is_root: bool) -> Vec<Advertisement> {
    let mut adverts = Vec::new();

    if is_root {
        adverts.push(Advertisement::new(
            SearchTarget::RootDevice,
            UniqueServiceName::qualified(device.udn.clone(), SearchTarget::RootDevice),
            device,
        ));
    }
    adverts.push(Advertisement::new(
        SearchTarget::Udn(device.udn.clone()),
        UniqueServiceName::device(device.udn.clone()),
        device,
    ));
    adverts.push(Advertisement::new(
        SearchTarget::Device(device.device_type.clone()),
        UniqueServiceName::qualified(
            device.udn.clone(),
            SearchTarget::Device(device.device_type.clone()),
        ),
        device,
    ));
    for service_type in device.service_types() {
        adverts.push(Advertisement::new(
            SearchTarget::Service(service_type.clone()),
            UniqueServiceName::qualified(
                device.udn.clone(),
                SearchTarget::Service(service_type),
            ),
            device,
        ));
    }

    adverts
}

/// The advertisement set of a whole root tree, root first, depth first.
pub fn tree_advertisements(root: &Arc<LocalDevice>) -> Vec<Advertisement> {
    let mut adverts = Vec::new();
    for device in root.flatten() {
        let is_root = device.udn == root.udn;
        adverts.extend(device_advertisements(&device, is_root));
    }
    adverts
}
