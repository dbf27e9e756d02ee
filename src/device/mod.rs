//! Network device data model.
//!
//! One authoritative configuration shape is shared by every consumer: the
//! CLI interpreter, the addressing engine and the exporter all read and
//! patch the same structures. Fields are optional because a device starts
//! with an empty configuration and accumulates state command by command.

pub mod store;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use store::DeviceStore;

/// Opaque device identifier handed out by the store.
pub type DeviceId = String;

/// Identifier of one topology link; both endpoints store it.
pub type LinkId = String;

/// The three device kinds the lab supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Router,
    Switch,
    Pc,
}

impl DeviceKind {
    /// Display-label prefix used when generating unique device names.
    pub fn label_prefix(self) -> &'static str {
        match self {
            DeviceKind::Router => "Router",
            DeviceKind::Switch => "Switch",
            DeviceKind::Pc => "PC",
        }
    }

    /// Fixed port complement assigned at creation.
    pub fn ports(self) -> Vec<String> {
        match self {
            DeviceKind::Switch => {
                let mut ports = vec![
                    "GigabitEthernet 0/1".to_string(),
                    "GigabitEthernet 0/2".to_string(),
                ];
                for n in 1..=24 {
                    ports.push(format!("FastEthernet 0/{}", n));
                }
                ports
            }
            DeviceKind::Router => {
                let mut ports: Vec<String> =
                    (0..=5).map(|n| format!("GigabitEthernet 0/{}", n)).collect();
                ports.push("Serial 0/0".to_string());
                ports
            }
            DeviceKind::Pc => vec!["FastEthernet 0/1".to_string()],
        }
    }
}

/// One endpoint's half of a connection between two device ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLink {
    /// Port on the device that owns this entry.
    pub local_port: String,
    /// The device at the far end.
    pub peer_device: DeviceId,
    /// Port on the far-end device.
    pub peer_port: String,
}

/// A device in the topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub kind: DeviceKind,
    /// Unique per kind, e.g. `Switch-2`.
    pub label: String,
    pub ports: Vec<String>,
    /// Link id to this device's half of the connection.
    #[serde(default)]
    pub connections: BTreeMap<LinkId, PortLink>,
    /// Canvas placement; carried for callers, never interpreted here.
    #[serde(default)]
    pub position: (f64, f64),
    #[serde(default)]
    pub config: DeviceConfig,
}

/// Layer-2 port operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    Access,
    Trunk,
}

/// A VLAN definition on a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: u16,
    pub name: String,
}

/// Logical aggregation of physical ports sharing one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub id: u32,
    pub member_ports: Vec<String>,
    /// Optional shared L2 config rendered as the Port-channel interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<InterfaceConfig>,
}

/// Spanning-tree settings for a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpConfig {
    #[serde(default)]
    pub rapid: bool,
    /// VLANs for which this switch is the primary root bridge.
    #[serde(default)]
    pub primary: BTreeSet<u16>,
    #[serde(default)]
    pub secondary: BTreeSet<u16>,
}

/// Management SVI of a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementConfig {
    pub vlan_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

/// IP configuration of one router sub-interface (router-on-a-stick).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubInterfaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

/// Per-port configuration.
///
/// The switch-only and router-only fields live side by side, mirroring the
/// single configuration object every device carries; the exporter and the
/// interpreter pick the fields relevant to the device kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PortMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub trunk_vlans: BTreeSet<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_vlan: Option<u16>,
    #[serde(default)]
    pub bpdu_guard: bool,
    #[serde(default)]
    pub portfast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    /// VLAN id to sub-interface config, kept sorted for cascading/export.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_interfaces: BTreeMap<u16, SubInterfaceConfig>,
}

/// Static route entry, unique by network+mask+next-hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub network: String,
    pub mask: String,
    pub next_hop: String,
}

/// One `network <ip> <wildcard> area <area>` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfNetwork {
    pub network: String,
    pub wildcard: String,
    pub area: String,
}

/// OSPF process configuration; a router runs at most one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfConfig {
    pub process_id: String,
    #[serde(default)]
    pub networks: Vec<OspfNetwork>,
}

/// BGP neighbor, unique per ip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub ip: String,
    pub remote_as: String,
}

/// BGP process configuration; a router runs at most one AS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpConfig {
    pub as_number: String,
    #[serde(default)]
    pub neighbors: Vec<BgpNeighbor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    Permit,
    Deny,
}

/// Single rule of a standard access list; order matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    pub action: AclAction,
    pub source_ip: String,
    pub source_wildcard: String,
}

/// Standard numbered access list (1-99).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    pub id: u32,
    #[serde(default)]
    pub rules: Vec<AclRule>,
}

/// How a PC obtains its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingMode {
    Static,
    Dhcp,
}

/// Per-device configuration object.
///
/// Which fields are populated depends on the device kind; everything starts
/// empty and is filled through [`ConfigPatch`] merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<String>,

    // PC addressing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_mode: Option<AddressingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_mask: Option<String>,

    // Switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlans: Option<Vec<Vlan>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_groups: Option<Vec<ChannelGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stp: Option<StpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management: Option<ManagementConfig>,

    // Shared by switches and routers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<BTreeMap<String, InterfaceConfig>>,

    // Router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_excluded: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_routes: Option<Vec<StaticRoute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ospf: Option<OspfConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_lists: Option<Vec<AccessList>>,
}

/// One field of a configuration patch.
///
/// `Keep` leaves the stored value alone, `Set` replaces the top-level value
/// wholesale (nested structures are never deep-merged) and `Clear` removes
/// it. `Clear` is what lets `no router ospf` actually drop the process.
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    fn apply(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value),
            Patch::Clear => *slot = None,
        }
    }
}

/// Shallow patch over [`DeviceConfig`], one slot per top-level key.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub hostname: Patch<String>,
    pub default_gateway: Patch<String>,
    pub ipv4_mode: Patch<AddressingMode>,
    pub ipv4: Patch<String>,
    pub ipv4_mask: Patch<String>,
    pub vlans: Patch<Vec<Vlan>>,
    pub channel_groups: Patch<Vec<ChannelGroup>>,
    pub stp: Patch<StpConfig>,
    pub management: Patch<ManagementConfig>,
    pub interfaces: Patch<BTreeMap<String, InterfaceConfig>>,
    pub dhcp_excluded: Patch<BTreeSet<String>>,
    pub static_routes: Patch<Vec<StaticRoute>>,
    pub ospf: Patch<OspfConfig>,
    pub bgp: Patch<BgpConfig>,
    pub access_lists: Patch<Vec<AccessList>>,
}

impl DeviceConfig {
    /// Applies a shallow patch; `Set` keys replace their previous value
    /// wholesale. Validation is the caller's responsibility.
    pub fn merge(&mut self, patch: ConfigPatch) {
        patch.hostname.apply(&mut self.hostname);
        patch.default_gateway.apply(&mut self.default_gateway);
        patch.ipv4_mode.apply(&mut self.ipv4_mode);
        patch.ipv4.apply(&mut self.ipv4);
        patch.ipv4_mask.apply(&mut self.ipv4_mask);
        patch.vlans.apply(&mut self.vlans);
        patch.channel_groups.apply(&mut self.channel_groups);
        patch.stp.apply(&mut self.stp);
        patch.management.apply(&mut self.management);
        patch.interfaces.apply(&mut self.interfaces);
        patch.dhcp_excluded.apply(&mut self.dhcp_excluded);
        patch.static_routes.apply(&mut self.static_routes);
        patch.ospf.apply(&mut self.ospf);
        patch.bgp.apply(&mut self.bgp);
        patch.access_lists.apply(&mut self.access_lists);
    }
}

/// Parses and range-checks a VLAN id (1-4094).
pub fn parse_vlan_id(token: &str) -> Option<u16> {
    let id: u16 = token.parse().ok()?;
    if (1..=4094).contains(&id) {
        Some(id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sets_and_keeps() {
        let mut config = DeviceConfig {
            hostname: Some("SW1".to_string()),
            ..Default::default()
        };
        config.merge(ConfigPatch {
            default_gateway: Patch::Set("10.0.0.1".to_string()),
            ..Default::default()
        });
        assert_eq!(config.hostname.as_deref(), Some("SW1"));
        assert_eq!(config.default_gateway.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_merge_clear_removes_key() {
        let mut config = DeviceConfig {
            ospf: Some(OspfConfig {
                process_id: "1".to_string(),
                networks: vec![],
            }),
            ..Default::default()
        };
        config.merge(ConfigPatch {
            ospf: Patch::Clear,
            ..Default::default()
        });
        assert!(config.ospf.is_none());
    }

    #[test]
    fn test_merge_replaces_nested_wholesale() {
        let mut interfaces = BTreeMap::new();
        interfaces.insert(
            "FastEthernet 0/1".to_string(),
            InterfaceConfig {
                mode: Some(PortMode::Access),
                ..Default::default()
            },
        );
        let mut config = DeviceConfig {
            interfaces: Some(interfaces),
            ..Default::default()
        };

        // A patch carrying a different port map does not retain the old port.
        let mut replacement = BTreeMap::new();
        replacement.insert("FastEthernet 0/2".to_string(), InterfaceConfig::default());
        config.merge(ConfigPatch {
            interfaces: Patch::Set(replacement),
            ..Default::default()
        });
        let interfaces = config.interfaces.unwrap();
        assert!(!interfaces.contains_key("FastEthernet 0/1"));
        assert!(interfaces.contains_key("FastEthernet 0/2"));
    }

    #[test]
    fn test_vlan_id_bounds() {
        assert_eq!(parse_vlan_id("1"), Some(1));
        assert_eq!(parse_vlan_id("4094"), Some(4094));
        assert_eq!(parse_vlan_id("0"), None);
        assert_eq!(parse_vlan_id("4095"), None);
        assert_eq!(parse_vlan_id("ten"), None);
    }

    #[test]
    fn test_port_tables_per_kind() {
        assert_eq!(DeviceKind::Switch.ports().len(), 26);
        assert_eq!(DeviceKind::Router.ports().len(), 7);
        assert_eq!(DeviceKind::Pc.ports(), vec!["FastEthernet 0/1"]);
    }
}
