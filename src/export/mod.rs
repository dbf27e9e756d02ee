//! Rendering device configurations to vendor-style startup-config text.
//!
//! The exporter is a pure function of the device: it reads whatever
//! configuration exists and silently skips entries that are still
//! incomplete (a VLAN without a name, a sub-interface without an ip), so a
//! half-built topology always exports without errors.

use std::collections::BTreeMap;

use crate::addressing::calc::network_info;
use crate::device::{DeviceKind, InterfaceConfig, NetworkDevice, PortMode};

/// Renders the full config text for one device.
pub fn export_config(device: &NetworkDevice) -> String {
    let config = &device.config;
    let mut output = String::new();

    if let Some(hostname) = &config.hostname {
        output.push_str(&format!("hostname {}\n", hostname));
    }
    if let Some(gateway) = &config.default_gateway {
        output.push_str(&format!("ip default-gateway {}\n", gateway));
    }

    match device.kind {
        DeviceKind::Switch => export_switch(device, &mut output),
        DeviceKind::Router => export_router(device, &mut output),
        DeviceKind::Pc => export_pc(device, &mut output),
    }
    output
}

/// Layer-2 lines shared by physical ports and Port-channel interfaces.
fn l2_lines(cfg: &InterfaceConfig, output: &mut String) {
    match cfg.mode {
        Some(PortMode::Access) => {
            if let Some(vlan) = cfg.access_vlan {
                output.push_str(&format!(
                    " switchport mode access\n switchport access vlan {}\n",
                    vlan
                ));
            } else {
                output.push_str(" switchport mode access\n");
            }
            if cfg.portfast {
                output.push_str(" spanning-tree portfast\n");
            }
            if cfg.bpdu_guard {
                output.push_str(" spanning-tree bpduguard enable\n");
            }
        }
        Some(PortMode::Trunk) => {
            output.push_str(" switchport mode trunk\n");
            if !cfg.trunk_vlans.is_empty() {
                let list: Vec<String> =
                    cfg.trunk_vlans.iter().map(|v| v.to_string()).collect();
                output.push_str(&format!(
                    " switchport trunk allowed vlan {}\n",
                    list.join(",")
                ));
            }
            if let Some(native) = cfg.native_vlan {
                output.push_str(&format!(" switchport trunk native vlan {}\n", native));
            }
        }
        None => {}
    }
}

fn export_switch(device: &NetworkDevice, output: &mut String) {
    let config = &device.config;

    if let Some(stp) = &config.stp {
        if stp.rapid {
            output.push_str("spanning-tree mode rapid-pvst\n");
        } else {
            output.push_str("spanning-tree mode pvst\n");
        }
        if !stp.primary.is_empty() {
            let list: Vec<String> = stp.primary.iter().map(|v| v.to_string()).collect();
            output.push_str(&format!(
                "spanning-tree vlan {} root primary\n",
                list.join(",")
            ));
        }
        if !stp.secondary.is_empty() {
            let list: Vec<String> = stp.secondary.iter().map(|v| v.to_string()).collect();
            output.push_str(&format!(
                "spanning-tree vlan {} root secondary\n",
                list.join(",")
            ));
        }
    }
    output.push_str("!\n");

    for vlan in config.vlans.iter().flatten() {
        if !vlan.name.is_empty() {
            output.push_str(&format!("vlan {}\n name {}\n!\n", vlan.id, vlan.name));
        }
    }

    if let Some(management) = &config.management {
        if let (Some(ip), Some(mask)) = (&management.ip, &management.mask) {
            output.push_str(&format!("interface Vlan{}\n", management.vlan_id));
            output.push_str(" description Management Interface\n");
            output.push_str(&format!(" ip address {} {}\n", ip, mask));
            output.push_str(" no shutdown\n!\n");
        }
    }

    if let Some(interfaces) = &config.interfaces {
        let mut port_to_group: BTreeMap<&str, u32> = BTreeMap::new();
        for group in config.channel_groups.iter().flatten() {
            for port in &group.member_ports {
                port_to_group.insert(port.as_str(), group.id);
            }
        }

        for (port, cfg) in interfaces {
            output.push_str(&format!("interface {}\n", port));
            if let Some(group_id) = port_to_group.get(port.as_str()) {
                output.push_str(&format!(" channel-group {} mode active\n", group_id));
            }
            l2_lines(cfg, output);
            if cfg.up {
                output.push_str(" no shutdown\n");
            }
            output.push_str("!\n");
        }
    }

    for group in config.channel_groups.iter().flatten() {
        if let Some(cfg) = &group.config {
            output.push_str(&format!("interface Port-channel {}\n", group.id));
            l2_lines(cfg, output);
            output.push_str(" no shutdown\n!\n");
        }
    }
}

fn export_router(device: &NetworkDevice, output: &mut String) {
    let config = &device.config;

    // All complete sub-interfaces across every port, by VLAN id, drive the
    // DHCP pool blocks.
    let mut pools: BTreeMap<u16, (&str, &str)> = BTreeMap::new();
    for cfg in config.interfaces.iter().flat_map(|map| map.values()) {
        for (vlan_id, sub) in &cfg.sub_interfaces {
            if let (Some(ip), Some(mask)) = (&sub.ip, &sub.mask) {
                pools.insert(*vlan_id, (ip, mask));
            }
        }
    }

    if let Some(excluded) = &config.dhcp_excluded {
        if !excluded.is_empty() {
            output.push_str("!\n");
            for ip in excluded {
                output.push_str(&format!("ip dhcp excluded-address {}\n", ip));
            }
        }
    }

    if !pools.is_empty() {
        output.push_str("!\n");
        for (vlan_id, (ip, mask)) in &pools {
            if let Some(info) = network_info(ip, mask) {
                output.push_str(&format!("ip dhcp pool LAN-POOL-VLAN-{}\n", vlan_id));
                output.push_str(&format!(" network {} {}\n", info.network, mask));
                output.push_str(&format!(" default-router {}\n", ip));
                output.push_str("!\n");
            }
        }
    }

    if let Some(interfaces) = &config.interfaces {
        output.push_str("!\n");
        for (port, cfg) in interfaces {
            output.push_str(&format!("interface {}\n", port));
            if let Some(description) = &cfg.description {
                output.push_str(&format!(" description {}\n", description));
            }
            // A port carrying sub-interfaces never carries its own address.
            if !cfg.sub_interfaces.is_empty() {
                output.push_str(" no ip address\n");
            } else if let (Some(ip), Some(mask)) = (&cfg.ip, &cfg.mask) {
                output.push_str(&format!(" ip address {} {}\n", ip, mask));
            }
            output.push_str(" no shutdown\n!\n");

            for (vlan_id, sub) in &cfg.sub_interfaces {
                if let (Some(ip), Some(mask)) = (&sub.ip, &sub.mask) {
                    output.push_str(&format!("interface {}.{}\n", port, vlan_id));
                    output.push_str(&format!(" encapsulation dot1Q {}\n", vlan_id));
                    output.push_str(&format!(" ip address {} {}\n", ip, mask));
                    output.push_str(" no shutdown\n!\n");
                }
            }
        }
    }
}

fn export_pc(device: &NetworkDevice, output: &mut String) {
    let config = &device.config;
    if let (Some(ip), Some(mask)) = (&config.ipv4, &config.ipv4_mask) {
        output.push_str(&format!("ip address {} {}", ip, mask));
    }
}
