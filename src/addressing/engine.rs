//! Topology-aware addressing derivations.
//!
//! Three concerns: the auto-excluded address set a router's DHCP pools must
//! never hand out, the deterministic subnet cascade across ordered VLAN
//! sub-interfaces, and the graph walk that decides which router serves a
//! given host's access VLAN.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;

use crate::addressing::calc::{int_to_ip, ip_to_int, network_info};
use crate::device::{DeviceConfig, DeviceId, DeviceKind, DeviceStore, InterfaceConfig, PortMode};

/// Result of resolving which router answers a host's DHCP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInfo {
    pub gateway_ip: String,
    pub router_id: DeviceId,
    pub vlan_id: u16,
}

/// Addresses a router must never lease: every configured sub-interface
/// gateway ip plus the broadcast address of its subnet.
pub fn auto_excluded_addresses(config: &DeviceConfig) -> BTreeSet<String> {
    let mut excluded = BTreeSet::new();
    let Some(interfaces) = &config.interfaces else {
        return excluded;
    };
    for iface in interfaces.values() {
        for sub in iface.sub_interfaces.values() {
            let (Some(ip), Some(mask)) = (&sub.ip, &sub.mask) else {
                continue;
            };
            excluded.insert(ip.clone());
            if let Some(info) = network_info(ip, mask) {
                excluded.insert(info.broadcast);
            }
        }
    }
    excluded
}

/// Re-derives the IP chain across VLAN sub-interfaces.
///
/// The first VLAN in `vlan_order` keeps whatever the user entered; every
/// subsequent VLAN gets the previous subnet's broadcast + 2 (one address of
/// inter-subnet gap), or a cleared ip when the previous link of the chain
/// does not resolve. Run after every sub-interface edit.
pub fn cascade_sub_interfaces(
    interfaces: &mut BTreeMap<String, InterfaceConfig>,
    vlan_order: &[u16],
) {
    let mut last_broadcast: Option<u32> = None;
    for (position, vlan_id) in vlan_order.iter().enumerate() {
        let Some(sub) = interfaces
            .values_mut()
            .find_map(|iface| iface.sub_interfaces.get_mut(vlan_id))
        else {
            continue;
        };
        if position > 0 {
            match last_broadcast {
                Some(broadcast) => sub.ip = Some(int_to_ip(broadcast.wrapping_add(2))),
                None => sub.ip = None,
            }
        }
        let info = match (&sub.ip, &sub.mask) {
            (Some(ip), Some(mask)) => network_info(ip, mask),
            _ => None,
        };
        last_broadcast = info.and_then(|i| ip_to_int(&i.broadcast).ok());
    }
}

/// Walks the topology from a host to the router serving its access VLAN.
///
/// The host's single connection must land on a switch port in access mode;
/// from there the walk follows trunk ports that carry the VLAN (allowed
/// list or native membership) across switches, visiting each device at most
/// once, until a router with a configured sub-interface for the VLAN is
/// found. First match wins; topologies are expected to be trees in
/// practice.
pub fn resolve_gateway_for_host(store: &DeviceStore, host_id: &str) -> Option<GatewayInfo> {
    let host = store.device(host_id)?;
    let link = host.connections.values().next()?;

    let switch = store.device(&link.peer_device)?;
    if switch.kind != DeviceKind::Switch {
        return None;
    }
    let port_config = switch.config.interfaces.as_ref()?.get(&link.peer_port)?;
    if port_config.mode != Some(PortMode::Access) {
        return None;
    }
    let vlan_id = port_config.access_vlan?;

    let mut visited: HashSet<DeviceId> = HashSet::new();
    visited.insert(host_id.to_string());
    let found = walk_for_router(store, &link.peer_device, vlan_id, &mut visited);
    if found.is_none() {
        debug!("No router answers VLAN {} for host {}", vlan_id, host_id);
    }
    found
}

fn walk_for_router(
    store: &DeviceStore,
    device_id: &str,
    vlan_id: u16,
    visited: &mut HashSet<DeviceId>,
) -> Option<GatewayInfo> {
    if !visited.insert(device_id.to_string()) {
        return None;
    }
    let device = store.device(device_id)?;

    for link in device.connections.values() {
        let Some(neighbor) = store.device(&link.peer_device) else {
            continue;
        };
        let local = device
            .config
            .interfaces
            .as_ref()
            .and_then(|ifaces| ifaces.get(&link.local_port));
        let trunk_carries_vlan = local.is_some_and(|cfg| {
            cfg.mode == Some(PortMode::Trunk)
                && (cfg.trunk_vlans.contains(&vlan_id) || cfg.native_vlan == Some(vlan_id))
        });
        if !trunk_carries_vlan {
            continue;
        }

        if neighbor.kind == DeviceKind::Router {
            if let Some(interfaces) = &neighbor.config.interfaces {
                for iface in interfaces.values() {
                    if let Some(sub) = iface.sub_interfaces.get(&vlan_id) {
                        if let Some(gateway_ip) = &sub.ip {
                            return Some(GatewayInfo {
                                gateway_ip: gateway_ip.clone(),
                                router_id: link.peer_device.clone(),
                                vlan_id,
                            });
                        }
                    }
                }
            }
        }
        if neighbor.kind == DeviceKind::Switch {
            if let Some(found) = walk_for_router(store, &link.peer_device, vlan_id, visited) {
                return Some(found);
            }
        }
    }
    None
}
