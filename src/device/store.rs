//! Authoritative in-memory device collection.
//!
//! The store is the single source of truth for devices and their
//! port-to-port connections. Derived views (addressing, export, prompts)
//! are recomputed from it on demand rather than cached, so there is no
//! second copy to keep consistent.

use std::collections::BTreeMap;

use log::debug;

use super::{ConfigPatch, DeviceId, DeviceKind, LinkId, NetworkDevice, PortLink};

/// In-memory topology: devices plus both halves of every connection.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: BTreeMap<DeviceId, NetworkDevice>,
    next_id: u64,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device of the given kind with an empty configuration and
    /// a fresh unique label, returning its id.
    pub fn create_device(&mut self, kind: DeviceKind) -> DeviceId {
        self.next_id += 1;
        let id = format!("dev-{}", self.next_id);
        let label = self.unique_label(kind);
        debug!("Creating {:?} {} ({})", kind, label, id);
        self.devices.insert(
            id.clone(),
            NetworkDevice {
                kind,
                label,
                ports: kind.ports(),
                connections: BTreeMap::new(),
                position: (0.0, 0.0),
                config: Default::default(),
            },
        );
        id
    }

    /// Smallest `<Prefix>-<N>` not yet used among devices of this kind.
    fn unique_label(&self, kind: DeviceKind) -> String {
        let prefix = kind.label_prefix();
        let mut counter = 1;
        loop {
            let candidate = format!("{}-{}", prefix, counter);
            let taken = self
                .devices
                .values()
                .any(|d| d.kind == kind && d.label == candidate);
            if !taken {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Removes a device and detaches both halves of every connection it
    /// participates in. Unknown ids are ignored.
    pub fn remove_device(&mut self, id: &str) {
        let Some(device) = self.devices.remove(id) else {
            return;
        };
        debug!("Removing {} ({})", device.label, id);
        for (link_id, link) in &device.connections {
            if let Some(peer) = self.devices.get_mut(&link.peer_device) {
                peer.connections.remove(link_id);
            }
        }
    }

    /// Records both halves of a connection between two device ports.
    ///
    /// A silent no-op when either device is unknown. The store does not
    /// reject a port that is already bound by another link; callers enforce
    /// one-link-per-port above this layer.
    pub fn connect(
        &mut self,
        link_id: &str,
        a: (&str, &str),
        b: (&str, &str),
    ) {
        let (device_a, port_a) = a;
        let (device_b, port_b) = b;
        if !self.devices.contains_key(device_a) || !self.devices.contains_key(device_b) {
            debug!("Ignoring connect {}: unknown endpoint", link_id);
            return;
        }
        if let Some(device) = self.devices.get_mut(device_a) {
            device.connections.insert(
                link_id.to_string(),
                PortLink {
                    local_port: port_a.to_string(),
                    peer_device: device_b.to_string(),
                    peer_port: port_b.to_string(),
                },
            );
        }
        if let Some(device) = self.devices.get_mut(device_b) {
            device.connections.insert(
                link_id.to_string(),
                PortLink {
                    local_port: port_b.to_string(),
                    peer_device: device_a.to_string(),
                    peer_port: port_a.to_string(),
                },
            );
        }
        debug!("Connected {}:{} <-> {}:{}", device_a, port_a, device_b, port_b);
    }

    /// Removes the matching half from every device that has it.
    pub fn disconnect(&mut self, link_id: &str) {
        for device in self.devices.values_mut() {
            device.connections.remove(link_id);
        }
    }

    /// Applies a shallow config patch to a device; unknown ids are ignored.
    pub fn merge_config(&mut self, id: &str, patch: ConfigPatch) {
        if let Some(device) = self.devices.get_mut(id) {
            device.config.merge(patch);
        }
    }

    pub fn device(&self, id: &str) -> Option<&NetworkDevice> {
        self.devices.get(id)
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut NetworkDevice> {
        self.devices.get_mut(id)
    }

    /// All devices in insertion-id order.
    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, &NetworkDevice)> {
        self.devices.iter()
    }

    /// Link ids currently known to any device.
    pub fn links(&self) -> impl Iterator<Item = (&LinkId, &PortLink)> {
        self.devices.values().flat_map(|d| d.connections.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Patch;

    #[test]
    fn test_unique_labels_reuse_smallest_free() {
        let mut store = DeviceStore::new();
        let s1 = store.create_device(DeviceKind::Switch);
        let s2 = store.create_device(DeviceKind::Switch);
        assert_eq!(store.device(&s1).unwrap().label, "Switch-1");
        assert_eq!(store.device(&s2).unwrap().label, "Switch-2");

        // Removing Switch-1 frees its number for the next switch.
        store.remove_device(&s1);
        let s3 = store.create_device(DeviceKind::Switch);
        assert_eq!(store.device(&s3).unwrap().label, "Switch-1");

        // Other kinds number independently.
        let r1 = store.create_device(DeviceKind::Router);
        assert_eq!(store.device(&r1).unwrap().label, "Router-1");
    }

    #[test]
    fn test_connect_records_both_halves() {
        let mut store = DeviceStore::new();
        let sw = store.create_device(DeviceKind::Switch);
        let pc = store.create_device(DeviceKind::Pc);
        store.connect(
            "link-1",
            (&sw, "FastEthernet 0/1"),
            (&pc, "FastEthernet 0/1"),
        );

        let half = store.device(&sw).unwrap().connections.get("link-1").unwrap();
        assert_eq!(half.peer_device, pc);
        assert_eq!(half.local_port, "FastEthernet 0/1");
        let other = store.device(&pc).unwrap().connections.get("link-1").unwrap();
        assert_eq!(other.peer_device, sw);
    }

    #[test]
    fn test_connect_unknown_device_is_noop() {
        let mut store = DeviceStore::new();
        let sw = store.create_device(DeviceKind::Switch);
        store.connect("link-1", (&sw, "FastEthernet 0/1"), ("ghost", "eth0"));
        assert!(store.device(&sw).unwrap().connections.is_empty());
    }

    #[test]
    fn test_remove_device_detaches_peer() {
        let mut store = DeviceStore::new();
        let sw = store.create_device(DeviceKind::Switch);
        let pc = store.create_device(DeviceKind::Pc);
        store.connect(
            "link-1",
            (&sw, "FastEthernet 0/1"),
            (&pc, "FastEthernet 0/1"),
        );
        store.remove_device(&pc);
        assert!(store.device(&sw).unwrap().connections.is_empty());
        assert!(store.device(&pc).is_none());
    }

    #[test]
    fn test_disconnect_removes_all_halves() {
        let mut store = DeviceStore::new();
        let sw = store.create_device(DeviceKind::Switch);
        let pc = store.create_device(DeviceKind::Pc);
        store.connect(
            "link-1",
            (&sw, "FastEthernet 0/1"),
            (&pc, "FastEthernet 0/1"),
        );
        store.disconnect("link-1");
        assert!(store.device(&sw).unwrap().connections.is_empty());
        assert!(store.device(&pc).unwrap().connections.is_empty());
    }

    #[test]
    fn test_merge_config_through_store() {
        let mut store = DeviceStore::new();
        let sw = store.create_device(DeviceKind::Switch);
        store.merge_config(
            &sw,
            ConfigPatch {
                hostname: Patch::Set("CORE-SW".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            store.device(&sw).unwrap().config.hostname.as_deref(),
            Some("CORE-SW")
        );
        // Unknown id: silently ignored.
        store.merge_config("ghost", ConfigPatch::default());
    }
}
