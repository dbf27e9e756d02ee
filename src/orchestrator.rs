//! Drives a scenario end to end.
//!
//! The orchestrator owns the store and the lease table, maps scenario
//! handles to store ids, replays CLI scripts through per-device sessions,
//! resolves DHCP for the hosts that asked for it, and finally renders one
//! config file per device plus a lease snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use color_eyre::Result;
use log::{debug, info, warn};
use serde_json::json;

use crate::addressing::engine::resolve_gateway_for_host;
use crate::addressing::leases::LeaseTable;
use crate::cli::CliSession;
use crate::device::{AddressingMode, ConfigPatch, DeviceId, DeviceStore, Patch};
use crate::export::export_config;
use crate::scenario::{Addressing, Scenario};

pub struct Orchestrator {
    store: DeviceStore,
    leases: LeaseTable,
    /// Scenario handle to store id.
    handles: HashMap<String, DeviceId>,
    /// CLI lines as they appeared on each device's terminal.
    transcripts: BTreeMap<String, Vec<String>>,
    used_ports: HashSet<(DeviceId, String)>,
    next_link: u64,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            store: DeviceStore::new(),
            leases: LeaseTable::new(),
            handles: HashMap::new(),
            transcripts: BTreeMap::new(),
            used_ports: HashSet::new(),
            next_link: 0,
        }
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    pub fn device_id(&self, handle: &str) -> Option<&DeviceId> {
        self.handles.get(handle)
    }

    /// Connects two ports, enforcing one cable per port. The store itself
    /// stays permissive; this is the layer that says no.
    pub fn connect(&mut self, a: (&str, &str), b: (&str, &str)) -> bool {
        for (device, port) in [a, b] {
            if self
                .used_ports
                .contains(&(device.to_string(), port.to_string()))
            {
                warn!("Refusing to double-cable {}:{}", device, port);
                return false;
            }
        }
        self.next_link += 1;
        let link_id = format!("link-{}", self.next_link);
        self.store.connect(&link_id, a, b);
        for (device, port) in [a, b] {
            self.used_ports
                .insert((device.to_string(), port.to_string()));
        }
        true
    }

    /// Removes a device and releases any lease it held; both ends of every
    /// cable it was part of become cableable again.
    pub fn remove_device(&mut self, id: &str) {
        self.leases.release(id);
        if let Some(device) = self.store.device(id) {
            for link in device.connections.values() {
                self.used_ports
                    .remove(&(link.peer_device.clone(), link.peer_port.clone()));
            }
        }
        self.used_ports.retain(|(device, _)| device != id);
        self.store.remove_device(id);
    }

    /// Builds the topology and replays every script of a validated
    /// scenario.
    pub fn run(&mut self, scenario: &Scenario) {
        for device in &scenario.devices {
            let id = self.store.create_device(device.kind);
            self.handles.insert(device.name.clone(), id);
        }
        info!("Created {} devices", scenario.devices.len());

        for link in &scenario.links {
            let (Some(a), Some(b)) = (
                self.handles.get(&link.a).cloned(),
                self.handles.get(&link.b).cloned(),
            ) else {
                continue;
            };
            self.connect((&a, &link.a_port), (&b, &link.b_port));
        }

        for script in &scenario.cli {
            let Some(id) = self.handles.get(&script.device).cloned() else {
                continue;
            };
            self.replay(&script.device, &id, &script.lines);
        }

        for device in &scenario.devices {
            if device.addressing == Addressing::Dhcp {
                self.resolve_dhcp(&device.name);
            }
        }
    }

    fn replay(&mut self, handle: &str, id: &DeviceId, lines: &[String]) {
        let mut session = CliSession::new(id.clone());
        let transcript = self.transcripts.entry(handle.to_string()).or_default();
        for line in lines {
            for output in session.submit_line(&mut self.store, line) {
                if output.starts_with('%') {
                    warn!("{}: {}", handle, output);
                } else {
                    debug!("{}: {}", handle, output);
                }
                transcript.push(output);
            }
        }
    }

    /// Resolves the serving router for a DHCP host and applies the lease to
    /// its configuration.
    fn resolve_dhcp(&mut self, handle: &str) {
        let Some(id) = self.handles.get(handle).cloned() else {
            return;
        };
        let Some(gateway) = resolve_gateway_for_host(&self.store, &id) else {
            warn!("{}: no gateway reachable, DHCP request failed", handle);
            return;
        };
        let Some(router) = self.store.device(&gateway.router_id).cloned() else {
            return;
        };
        let Some(lease) = self.leases.request(&id, &router, gateway.vlan_id) else {
            warn!(
                "{}: pool {}/VLAN {} could not lease an address",
                handle, router.label, gateway.vlan_id
            );
            return;
        };
        info!(
            "{}: leased {} (gateway {}, VLAN {})",
            handle, lease.ip, gateway.gateway_ip, gateway.vlan_id
        );
        self.store.merge_config(
            &id,
            ConfigPatch {
                ipv4_mode: Patch::Set(AddressingMode::Dhcp),
                ipv4: Patch::Set(lease.ip),
                ipv4_mask: Patch::Set(lease.mask),
                ..Default::default()
            },
        );
    }

    /// Writes `<label>.cfg` per device and `leases.json` into `dir`;
    /// optionally the CLI transcripts too.
    pub fn write_outputs(&self, dir: &Path, transcripts: bool) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (_, device) in self.store.devices() {
            let path = dir.join(format!("{}.cfg", device.label));
            fs::write(&path, export_config(device))?;
            debug!("Wrote {:?}", path);
        }

        let leases: Vec<_> = self
            .leases
            .all_leases()
            .into_iter()
            .map(|(router, vlan, ip, holder)| {
                let holder_label = self
                    .store
                    .device(&holder)
                    .map(|d| d.label.clone())
                    .unwrap_or(holder);
                json!({ "router": router, "vlan": vlan, "ip": ip, "host": holder_label })
            })
            .collect();
        fs::write(
            dir.join("leases.json"),
            serde_json::to_string_pretty(&leases)?,
        )?;

        if transcripts {
            for (handle, lines) in &self.transcripts {
                let mut text = lines.join("\n");
                text.push('\n');
                fs::write(dir.join(format!("{}.transcript.txt", handle)), text)?;
            }
        }
        info!("Outputs written to {:?}", dir);
        Ok(())
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    fn basic_scenario() -> Scenario {
        serde_yaml::from_str(
            r#"
devices:
  - { name: sw1, kind: switch }
  - { name: r1, kind: router }
  - { name: pc1, kind: pc, addressing: dhcp }
links:
  - { a: sw1, a_port: "FastEthernet 0/1", b: pc1, b_port: "FastEthernet 0/1" }
  - { a: sw1, a_port: "GigabitEthernet 0/1", b: r1, b_port: "GigabitEthernet 0/0" }
cli:
  - device: sw1
    lines:
      - enable
      - configure terminal
      - vlan 10
      - name Sales
      - exit
      - interface f0/1
      - switchport mode access
      - switchport access vlan 10
      - exit
      - interface g0/1
      - switchport mode trunk
      - switchport trunk allowed vlan 10
  - device: r1
    lines:
      - enable
      - configure terminal
      - interface g0/0.10
      - encapsulation dot1q 10
      - ip address 192.168.10.1 255.255.255.0
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_run_builds_topology_and_leases() {
        let scenario = basic_scenario();
        scenario.validate().unwrap();
        let mut orchestrator = Orchestrator::new();
        orchestrator.run(&scenario);

        let pc_id = orchestrator.device_id("pc1").unwrap().clone();
        let pc = orchestrator.store().device(&pc_id).unwrap();
        assert_eq!(pc.config.ipv4.as_deref(), Some("192.168.10.2"));
        assert_eq!(pc.config.ipv4_mask.as_deref(), Some("255.255.255.0"));
        // The lease records the serving gateway but the host config only
        // carries mode, address and mask.
        assert!(pc.config.default_gateway.is_none());
        assert_eq!(pc.config.ipv4_mode, Some(AddressingMode::Dhcp));
        assert_eq!(orchestrator.leases().all_leases().len(), 1);
    }

    #[test]
    fn test_double_cabling_refused_above_store() {
        let mut orchestrator = Orchestrator::new();
        let sw = orchestrator.store.create_device(DeviceKind::Switch);
        let pc1 = orchestrator.store.create_device(DeviceKind::Pc);
        let pc2 = orchestrator.store.create_device(DeviceKind::Pc);

        assert!(orchestrator.connect(
            (&sw, "FastEthernet 0/1"),
            (&pc1, "FastEthernet 0/1")
        ));
        assert!(!orchestrator.connect(
            (&sw, "FastEthernet 0/1"),
            (&pc2, "FastEthernet 0/1")
        ));
        assert_eq!(
            orchestrator.store.device(&sw).unwrap().connections.len(),
            1
        );
    }

    #[test]
    fn test_remove_device_releases_lease_and_ports() {
        let scenario = basic_scenario();
        let mut orchestrator = Orchestrator::new();
        orchestrator.run(&scenario);

        let pc_id = orchestrator.device_id("pc1").unwrap().clone();
        assert_eq!(orchestrator.leases().all_leases().len(), 1);

        orchestrator.remove_device(&pc_id);
        assert!(orchestrator.leases().all_leases().is_empty());
        assert!(orchestrator.store().device(&pc_id).is_none());

        // The freed switch port can be cabled again.
        let sw_id = orchestrator.device_id("sw1").unwrap().clone();
        let pc2 = orchestrator.store.create_device(DeviceKind::Pc);
        assert!(orchestrator.connect(
            (&sw_id, "FastEthernet 0/1"),
            (&pc2, "FastEthernet 0/1")
        ));
    }

    #[test]
    fn test_dhcp_without_gateway_leaves_pc_unconfigured() {
        let scenario: Scenario = serde_yaml::from_str(
            r#"
devices:
  - { name: sw1, kind: switch }
  - { name: pc1, kind: pc, addressing: dhcp }
links:
  - { a: sw1, a_port: "FastEthernet 0/1", b: pc1, b_port: "FastEthernet 0/1" }
"#,
        )
        .unwrap();
        let mut orchestrator = Orchestrator::new();
        orchestrator.run(&scenario);

        let pc_id = orchestrator.device_id("pc1").unwrap().clone();
        let pc = orchestrator.store().device(&pc_id).unwrap();
        assert!(pc.config.ipv4.is_none());
        assert!(orchestrator.leases().all_leases().is_empty());
    }

    #[test]
    fn test_write_outputs() {
        use tempfile::TempDir;

        let scenario = basic_scenario();
        let mut orchestrator = Orchestrator::new();
        orchestrator.run(&scenario);

        let dir = TempDir::new().unwrap();
        orchestrator.write_outputs(dir.path(), true).unwrap();

        let switch_cfg =
            std::fs::read_to_string(dir.path().join("Switch-1.cfg")).unwrap();
        assert!(switch_cfg.contains("vlan 10\n name Sales\n"));
        let router_cfg =
            std::fs::read_to_string(dir.path().join("Router-1.cfg")).unwrap();
        assert!(router_cfg.contains("ip dhcp pool LAN-POOL-VLAN-10\n"));
        let pc_cfg = std::fs::read_to_string(dir.path().join("PC-1.cfg")).unwrap();
        assert_eq!(pc_cfg, "ip address 192.168.10.2 255.255.255.0");

        let leases = std::fs::read_to_string(dir.path().join("leases.json")).unwrap();
        assert!(leases.contains("192.168.10.2"));
        assert!(dir.path().join("sw1.transcript.txt").exists());
    }
}
