//! Command execution.
//!
//! Every submitted line is tokenized, stripped of a leading `no` (the
//! negation flag travels with the handler), and dispatched on the current
//! mode. Handlers build the smallest [`ConfigPatch`] that expresses the
//! edit and hand it to the store; they never touch device state directly.
//! Anything unrecognized or invalid yields a single `%` diagnostic and
//! leaves both the session and the device untouched.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::json;

use crate::device::{
    parse_vlan_id, AccessList, AclAction, AclRule, BgpConfig, BgpNeighbor, ChannelGroup,
    ConfigPatch, DeviceKind, DeviceStore, InterfaceConfig, ManagementConfig, OspfConfig,
    OspfNetwork, Patch, PortMode, StaticRoute, SubInterfaceConfig, Vlan,
};

use super::parse::{expand_interface_name, parse_vlan_list};
use super::{CliMode, CliSession};

/// What a mode handler did with the tokens.
enum Outcome {
    /// Executed, nothing to print.
    Done,
    /// Executed or rejected with one output line.
    Reply(String),
    /// Not a command of this mode.
    Unhandled,
}

fn unrecognized(line: &str) -> String {
    format!("% Unrecognized command: \"{}\"", line)
}

fn set_interfaces(
    store: &mut DeviceStore,
    id: &str,
    interfaces: BTreeMap<String, InterfaceConfig>,
) {
    store.merge_config(
        id,
        ConfigPatch {
            interfaces: Patch::Set(interfaces),
            ..Default::default()
        },
    );
}

impl CliSession {
    /// Executes one trimmed, non-empty command line; returns its output
    /// line, if any.
    pub(crate) fn execute(&mut self, store: &mut DeviceStore, line: &str) -> Option<String> {
        if store.device(&self.device_id).is_none() {
            return Some("% No device selected.".to_string());
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let negated = tokens
            .first()
            .is_some_and(|t| t.eq_ignore_ascii_case("no"));
        let t: Vec<&str> = if negated {
            tokens[1..].to_vec()
        } else {
            tokens
        };
        if t.is_empty() {
            return Some(unrecognized(line));
        }

        if t[0] == "exit" {
            self.pop_mode();
            return None;
        }

        let outcome = match self.mode {
            CliMode::Exec => self.exec_mode(&t),
            CliMode::Privileged => self.privileged_mode(store, &t),
            CliMode::Config => self.config_mode(store, &t, negated),
            CliMode::ConfigVlan => self.vlan_mode(store, &t),
            CliMode::ConfigRouter => self.ospf_mode(store, &t, negated),
            CliMode::ConfigRouterBgp => self.bgp_mode(store, &t, negated),
            CliMode::ConfigStdNacl => self.acl_mode(store, &t, negated),
            CliMode::ConfigIf | CliMode::ConfigSubIf => self.interface_mode(store, &t, negated),
        };

        match outcome {
            Outcome::Done => None,
            Outcome::Reply(text) => Some(text),
            Outcome::Unhandled => Some(unrecognized(line)),
        }
    }

    /// `exit` pops exactly one level; a no-op in user mode.
    fn pop_mode(&mut self) {
        match self.mode {
            CliMode::ConfigVlan
            | CliMode::ConfigIf
            | CliMode::ConfigSubIf
            | CliMode::ConfigRouter
            | CliMode::ConfigStdNacl
            | CliMode::ConfigRouterBgp => {
                self.mode = CliMode::Config;
                self.current_interface = None;
                self.current_vlan = None;
                self.current_ospf = None;
                self.current_acl = None;
                self.current_bgp = None;
            }
            CliMode::Config => self.mode = CliMode::Privileged,
            CliMode::Privileged => self.mode = CliMode::Exec,
            CliMode::Exec => {}
        }
    }

    fn exec_mode(&mut self, t: &[&str]) -> Outcome {
        if t[0] == "enable" || t[0] == "en" {
            self.mode = CliMode::Privileged;
            return Outcome::Done;
        }
        Outcome::Unhandled
    }

    fn privileged_mode(&mut self, store: &DeviceStore, t: &[&str]) -> Outcome {
        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let config = &device.config;

        if t[0] == "disable" {
            self.mode = CliMode::Exec;
            return Outcome::Done;
        }
        if (t[0] == "configure" && t.get(1) == Some(&"terminal"))
            || (t[0] == "conf" && t.get(1) == Some(&"t"))
        {
            self.mode = CliMode::Config;
            return Outcome::Reply(
                "Enter configuration commands, one per line.  End with CNTL/Z.".to_string(),
            );
        }
        if t[0] == "show" && t.get(1) == Some(&"running-config") {
            return Outcome::Reply(pretty(config));
        }
        if t[0] == "show" && t.get(1) == Some(&"ip") {
            return match t.get(2) {
                Some(&"route") => Outcome::Reply(pretty(&json!({
                    "static": config.static_routes,
                    "ospf": config.ospf,
                }))),
                Some(&"ospf") => Outcome::Reply(pretty(&config.ospf)),
                Some(&"access-lists") => Outcome::Reply(pretty(&config.access_lists)),
                _ => Outcome::Unhandled,
            };
        }
        Outcome::Unhandled
    }

    fn config_mode(&mut self, store: &mut DeviceStore, t: &[&str], negated: bool) -> Outcome {
        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let kind = device.kind;
        let config = device.config.clone();
        let ports = device.ports.clone();
        let id = self.device_id.clone();

        if t[0] == "hostname" {
            if negated {
                store.merge_config(
                    &id,
                    ConfigPatch {
                        hostname: Patch::Clear,
                        ..Default::default()
                    },
                );
                return Outcome::Done;
            }
            let Some(name) = t.get(1) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            store.merge_config(
                &id,
                ConfigPatch {
                    hostname: Patch::Set((*name).to_string()),
                    ..Default::default()
                },
            );
            return Outcome::Done;
        }

        if kind == DeviceKind::Router {
            match self.router_global(store, &config, t, negated) {
                Outcome::Unhandled => {}
                handled => return handled,
            }
        }

        if t[0] == "vlan" {
            let Some(token) = t.get(1) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            let Some(vlan_id) = parse_vlan_id(token) else {
                return Outcome::Reply("% Invalid VLAN number.".to_string());
            };
            let mut vlans = config.vlans.clone().unwrap_or_default();
            if negated {
                vlans.retain(|v| v.id != vlan_id);
                store.merge_config(
                    &id,
                    ConfigPatch {
                        vlans: Patch::Set(vlans),
                        ..Default::default()
                    },
                );
                return Outcome::Reply(format!("VLAN {} removed.", vlan_id));
            }
            if !vlans.iter().any(|v| v.id == vlan_id) {
                vlans.push(Vlan {
                    id: vlan_id,
                    name: format!("VLAN{}", vlan_id),
                });
                store.merge_config(
                    &id,
                    ConfigPatch {
                        vlans: Patch::Set(vlans),
                        ..Default::default()
                    },
                );
            }
            self.current_vlan = Some(vlan_id);
            self.mode = CliMode::ConfigVlan;
            return Outcome::Done;
        }

        let is_stp = t[0] == "spanning-tree" || t[0] == "spa";
        if is_stp && t.get(1) == Some(&"mode") {
            if !matches!(t.get(2), Some(&"rapid-pvst") | Some(&"r")) {
                return Outcome::Unhandled;
            }
            let mut stp = config.stp.clone().unwrap_or_default();
            stp.rapid = !negated;
            store.merge_config(
                &id,
                ConfigPatch {
                    stp: Patch::Set(stp),
                    ..Default::default()
                },
            );
            return Outcome::Done;
        }
        if is_stp && t.get(1) == Some(&"vlan") {
            let Some(list) = t.get(2) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            if t.get(3) != Some(&"root") {
                return Outcome::Reply("% Incomplete command.".to_string());
            }
            let primary = match t.get(4) {
                Some(&"primary") => true,
                Some(&"secondary") => false,
                _ => return Outcome::Reply("% Incomplete command.".to_string()),
            };
            let vlans = parse_vlan_list(list);
            let mut stp = config.stp.clone().unwrap_or_default();
            for vlan in vlans {
                if negated {
                    if primary {
                        stp.primary.remove(&vlan);
                    } else {
                        stp.secondary.remove(&vlan);
                    }
                } else if primary {
                    stp.primary.insert(vlan);
                    stp.secondary.remove(&vlan);
                } else {
                    stp.secondary.insert(vlan);
                    stp.primary.remove(&vlan);
                }
            }
            store.merge_config(
                &id,
                ConfigPatch {
                    stp: Patch::Set(stp),
                    ..Default::default()
                },
            );
            return Outcome::Done;
        }

        if t[0] == "interface" || t[0] == "inter" {
            let Some(name) = t.get(1) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            if name.eq_ignore_ascii_case("vlan") {
                let Some(vlan_id) = t.get(2).and_then(|v| parse_vlan_id(v)) else {
                    return Outcome::Reply("% Invalid VLAN number.".to_string());
                };
                self.current_interface = Some(format!("Vlan{}", vlan_id));
                self.mode = CliMode::ConfigIf;
                return Outcome::Done;
            }
            match expand_interface_name(&ports, name) {
                Some(full) => {
                    self.mode = if full.contains('.') {
                        CliMode::ConfigSubIf
                    } else {
                        CliMode::ConfigIf
                    };
                    self.current_interface = Some(full);
                    Outcome::Done
                }
                None => Outcome::Reply("% Invalid interface type and number.".to_string()),
            }
        } else {
            Outcome::Unhandled
        }
    }

    /// Router-only global-config commands: static routes, OSPF, BGP, ACLs.
    fn router_global(
        &mut self,
        store: &mut DeviceStore,
        config: &crate::device::DeviceConfig,
        t: &[&str],
        negated: bool,
    ) -> Outcome {
        let id = self.device_id.clone();

        if t[0] == "ip" && t.get(1) == Some(&"route") {
            let (Some(network), Some(mask), Some(next_hop)) = (t.get(2), t.get(3), t.get(4))
            else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            let mut routes = config.static_routes.clone().unwrap_or_default();
            let matches = |r: &StaticRoute| {
                r.network == *network && r.mask == *mask && r.next_hop == *next_hop
            };
            if negated {
                let before = routes.len();
                routes.retain(|r| !matches(r));
                if routes.len() == before {
                    return Outcome::Reply(format!(
                        "% Route to {} via {} not found.",
                        network, next_hop
                    ));
                }
            } else {
                if routes.iter().any(matches) {
                    return Outcome::Reply(format!(
                        "% Route to {} via {} already exists.",
                        network, next_hop
                    ));
                }
                routes.push(StaticRoute {
                    network: (*network).to_string(),
                    mask: (*mask).to_string(),
                    next_hop: (*next_hop).to_string(),
                });
            }
            store.merge_config(
                &id,
                ConfigPatch {
                    static_routes: Patch::Set(routes),
                    ..Default::default()
                },
            );
            return Outcome::Done;
        }

        if t[0] == "router" && t.get(1) == Some(&"ospf") {
            let Some(process_id) = t.get(2) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            if negated {
                if config.ospf.as_ref().is_some_and(|o| o.process_id == *process_id) {
                    store.merge_config(
                        &id,
                        ConfigPatch {
                            ospf: Patch::Clear,
                            ..Default::default()
                        },
                    );
                }
                return Outcome::Done;
            }
            if let Some(ospf) = &config.ospf {
                if ospf.process_id != *process_id {
                    return Outcome::Reply(format!(
                        "% OSPF process {} is already running.",
                        ospf.process_id
                    ));
                }
            }
            let ospf = config.ospf.clone().unwrap_or_else(|| OspfConfig {
                process_id: (*process_id).to_string(),
                networks: Vec::new(),
            });
            store.merge_config(
                &id,
                ConfigPatch {
                    ospf: Patch::Set(ospf),
                    ..Default::default()
                },
            );
            self.current_ospf = Some((*process_id).to_string());
            self.mode = CliMode::ConfigRouter;
            return Outcome::Done;
        }

        if t[0] == "router" && t.get(1) == Some(&"bgp") {
            let Some(as_number) = t.get(2) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            if negated {
                if config.bgp.as_ref().is_some_and(|b| b.as_number == *as_number) {
                    store.merge_config(
                        &id,
                        ConfigPatch {
                            bgp: Patch::Clear,
                            ..Default::default()
                        },
                    );
                }
                return Outcome::Done;
            }
            if let Some(bgp) = &config.bgp {
                if bgp.as_number != *as_number {
                    return Outcome::Reply(format!(
                        "% BGP process {} is already running.",
                        bgp.as_number
                    ));
                }
            }
            let bgp = config.bgp.clone().unwrap_or_else(|| BgpConfig {
                as_number: (*as_number).to_string(),
                neighbors: Vec::new(),
            });
            store.merge_config(
                &id,
                ConfigPatch {
                    bgp: Patch::Set(bgp),
                    ..Default::default()
                },
            );
            self.current_bgp = Some((*as_number).to_string());
            self.mode = CliMode::ConfigRouterBgp;
            return Outcome::Done;
        }

        if t[0] == "access-list" {
            let Some(token) = t.get(1) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            let acl_id = match token.parse::<u32>() {
                Ok(id) if (1..=99).contains(&id) => id,
                _ => return Outcome::Reply("% Invalid access list number.".to_string()),
            };
            let mut lists = config.access_lists.clone().unwrap_or_default();
            if negated {
                // `no access-list <id>` removes the entire list.
                let before = lists.len();
                lists.retain(|acl| acl.id != acl_id);
                if lists.len() == before {
                    return Outcome::Reply(format!("% Access list {} not configured.", acl_id));
                }
                store.merge_config(
                    &id,
                    ConfigPatch {
                        access_lists: Patch::Set(lists),
                        ..Default::default()
                    },
                );
                return Outcome::Done;
            }
            if t.len() > 2 {
                return Outcome::Reply(
                    "% Incomplete command. Use this command to enter ACL configuration mode."
                        .to_string(),
                );
            }
            if !lists.iter().any(|acl| acl.id == acl_id) {
                lists.push(AccessList {
                    id: acl_id,
                    rules: Vec::new(),
                });
                store.merge_config(
                    &id,
                    ConfigPatch {
                        access_lists: Patch::Set(lists),
                        ..Default::default()
                    },
                );
            }
            self.current_acl = Some(acl_id);
            self.mode = CliMode::ConfigStdNacl;
            return Outcome::Done;
        }

        Outcome::Unhandled
    }

    fn vlan_mode(&mut self, store: &mut DeviceStore, t: &[&str]) -> Outcome {
        if t[0] != "name" {
            return Outcome::Unhandled;
        }
        let Some(name) = t.get(1) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };
        let Some(vlan_id) = self.current_vlan else {
            return Outcome::Reply("% Internal error: No VLAN selected.".to_string());
        };
        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let mut vlans = device.config.vlans.clone().unwrap_or_default();
        if let Some(vlan) = vlans.iter_mut().find(|v| v.id == vlan_id) {
            vlan.name = (*name).to_string();
            let id = self.device_id.clone();
            store.merge_config(
                &id,
                ConfigPatch {
                    vlans: Patch::Set(vlans),
                    ..Default::default()
                },
            );
        }
        Outcome::Done
    }

    fn ospf_mode(&mut self, store: &mut DeviceStore, t: &[&str], negated: bool) -> Outcome {
        if self.current_ospf.is_none() {
            return Outcome::Reply("% Internal error: No OSPF process selected.".to_string());
        }
        if t[0] != "network" {
            return Outcome::Unhandled;
        }
        let (Some(network), Some(wildcard)) = (t.get(1), t.get(2)) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };
        if t.get(3) != Some(&"area") {
            return Outcome::Reply("% Incomplete command.".to_string());
        }
        let Some(area) = t.get(4) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };

        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let Some(mut ospf) = device.config.ospf.clone() else {
            return Outcome::Reply("% Internal error: No OSPF process selected.".to_string());
        };
        let matches = |n: &OspfNetwork| {
            n.network == *network && n.wildcard == *wildcard && n.area == *area
        };
        if negated {
            ospf.networks.retain(|n| !matches(n));
        } else if !ospf.networks.iter().any(matches) {
            ospf.networks.push(OspfNetwork {
                network: (*network).to_string(),
                wildcard: (*wildcard).to_string(),
                area: (*area).to_string(),
            });
        }
        let id = self.device_id.clone();
        store.merge_config(
            &id,
            ConfigPatch {
                ospf: Patch::Set(ospf),
                ..Default::default()
            },
        );
        Outcome::Done
    }

    fn bgp_mode(&mut self, store: &mut DeviceStore, t: &[&str], negated: bool) -> Outcome {
        if self.current_bgp.is_none() {
            return Outcome::Reply("% Internal error: No BGP process selected.".to_string());
        }
        if t[0] != "neighbor" {
            return Outcome::Unhandled;
        }
        let Some(ip) = t.get(1) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };
        if t.get(2) != Some(&"remote-as") {
            return Outcome::Reply("% Incomplete command.".to_string());
        }
        let Some(remote_as) = t.get(3) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };

        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let Some(mut bgp) = device.config.bgp.clone() else {
            return Outcome::Reply("% Internal error: No BGP process selected.".to_string());
        };
        // One entry per neighbor ip: re-declaring replaces the remote AS.
        bgp.neighbors.retain(|n| n.ip != *ip);
        if !negated {
            bgp.neighbors.push(BgpNeighbor {
                ip: (*ip).to_string(),
                remote_as: (*remote_as).to_string(),
            });
        }
        let id = self.device_id.clone();
        store.merge_config(
            &id,
            ConfigPatch {
                bgp: Patch::Set(bgp),
                ..Default::default()
            },
        );
        Outcome::Done
    }

    fn acl_mode(&mut self, store: &mut DeviceStore, t: &[&str], negated: bool) -> Outcome {
        let Some(acl_id) = self.current_acl else {
            return Outcome::Reply("% Internal error: No ACL context.".to_string());
        };
        let action = match t[0] {
            "permit" => AclAction::Permit,
            "deny" => AclAction::Deny,
            _ => {
                return Outcome::Reply(
                    "% Invalid command. Expecting 'permit' or 'deny'.".to_string(),
                )
            }
        };

        let Some(first) = t.get(1) else {
            return Outcome::Reply("% Incomplete command.".to_string());
        };
        let (source_ip, source_wildcard) = if first.eq_ignore_ascii_case("host") {
            let Some(ip) = t.get(2) else {
                return Outcome::Reply("% Incomplete command.".to_string());
            };
            ((*ip).to_string(), "0.0.0.0".to_string())
        } else if first.eq_ignore_ascii_case("any") {
            ("0.0.0.0".to_string(), "255.255.255.255".to_string())
        } else {
            // Wildcard defaults to an exact host match.
            (
                (*first).to_string(),
                t.get(2).map_or_else(|| "0.0.0.0".to_string(), |w| (*w).to_string()),
            )
        };

        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let mut lists = device.config.access_lists.clone().unwrap_or_default();
        let Some(acl) = lists.iter_mut().find(|acl| acl.id == acl_id) else {
            return Outcome::Reply("% Internal error: ACL disappeared.".to_string());
        };

        if negated {
            let before = acl.rules.len();
            acl.rules.retain(|rule| {
                !(rule.action == action
                    && rule.source_ip == source_ip
                    && rule.source_wildcard == source_wildcard)
            });
            if acl.rules.len() == before {
                return Outcome::Reply("% Rule not found.".to_string());
            }
        } else {
            acl.rules.push(AclRule {
                action,
                source_ip,
                source_wildcard,
            });
        }
        let id = self.device_id.clone();
        store.merge_config(
            &id,
            ConfigPatch {
                access_lists: Patch::Set(lists),
                ..Default::default()
            },
        );
        Outcome::Done
    }

    fn interface_mode(&mut self, store: &mut DeviceStore, t: &[&str], negated: bool) -> Outcome {
        let Some(current) = self.current_interface.clone() else {
            return Outcome::Reply("% Internal error: No interface selected.".to_string());
        };
        let Some(device) = store.device(&self.device_id) else {
            return Outcome::Unhandled;
        };
        let kind = device.kind;
        let id = self.device_id.clone();

        let (main_port, sub_vlan) = match current.split_once('.') {
            Some((port, sub)) => (port.to_string(), parse_vlan_id(sub)),
            None => (current.clone(), None),
        };
        let mut interfaces = device.config.interfaces.clone().unwrap_or_default();
        interfaces.entry(main_port.clone()).or_default();

        if t[0] == "shutdown" || t[0] == "shut" {
            if let Some(entry) = interfaces.get_mut(&main_port) {
                entry.up = negated;
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if t[0] == "description" || t[0] == "desc" {
            if let Some(entry) = interfaces.get_mut(&main_port) {
                entry.description = if negated {
                    None
                } else {
                    Some(t[1..].join(" "))
                };
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }

        let is_ip_address =
            t[0] == "ip" && matches!(t.get(1), Some(&"address") | Some(&"add"));

        if kind == DeviceKind::Router {
            if self.mode == CliMode::ConfigSubIf {
                let Some(vlan_id) = sub_vlan else {
                    return Outcome::Reply("% Invalid interface type and number.".to_string());
                };
                if (t[0] == "encapsulation" || t[0] == "enc") && t.get(1) == Some(&"dot1q") {
                    let Some(tag) = t.get(2) else {
                        return Outcome::Reply("% Incomplete command.".to_string());
                    };
                    if parse_vlan_id(tag) != Some(vlan_id) {
                        return Outcome::Reply(format!(
                            "% Configuring encapsulation on subinterface {} for a different VLAN is not allowed.",
                            current
                        ));
                    }
                    if let Some(entry) = interfaces.get_mut(&main_port) {
                        if negated {
                            entry.sub_interfaces.remove(&vlan_id);
                        } else {
                            entry.sub_interfaces.entry(vlan_id).or_default();
                        }
                    }
                    set_interfaces(store, &id, interfaces);
                    return Outcome::Done;
                }
                if is_ip_address && (negated || t.len() > 2) {
                    if let Some(entry) = interfaces.get_mut(&main_port) {
                        if negated {
                            entry.sub_interfaces.remove(&vlan_id);
                        } else {
                            entry.sub_interfaces.insert(
                                vlan_id,
                                SubInterfaceConfig {
                                    ip: t.get(2).map(|s| (*s).to_string()),
                                    mask: Some(
                                        t.get(3)
                                            .map_or("255.255.255.0", |m| *m)
                                            .to_string(),
                                    ),
                                },
                            );
                        }
                    }
                    set_interfaces(store, &id, interfaces);
                    return Outcome::Done;
                }
            } else if is_ip_address && (negated || t.len() > 2) {
                if let Some(entry) = interfaces.get_mut(&main_port) {
                    if negated {
                        entry.ip = None;
                        entry.mask = None;
                    } else {
                        entry.ip = t.get(2).map(|s| (*s).to_string());
                        entry.mask = t.get(3).map(|s| (*s).to_string());
                    }
                }
                set_interfaces(store, &id, interfaces);
                return Outcome::Done;
            }
        }

        if self.mode == CliMode::ConfigIf {
            // `interface vlan <id>` configures the management SVI.
            let svi = Regex::new(r"^Vlan(\d+)$")
                .ok()
                .and_then(|re| re.captures(&current))
                .and_then(|caps| parse_vlan_id(caps.get(1)?.as_str()));
            if let Some(vlan_id) = svi {
                if is_ip_address && (negated || t.len() > 2) {
                    store.merge_config(
                        &id,
                        ConfigPatch {
                            management: Patch::Set(ManagementConfig {
                                vlan_id,
                                ip: if negated {
                                    None
                                } else {
                                    t.get(2).map(|s| (*s).to_string())
                                },
                                mask: if negated {
                                    None
                                } else {
                                    t.get(3).map(|s| (*s).to_string())
                                },
                            }),
                            ..Default::default()
                        },
                    );
                    return Outcome::Done;
                }
            } else if kind == DeviceKind::Switch {
                return self.switch_port(store, t, negated, &main_port, interfaces);
            }
        }

        Outcome::Unhandled
    }

    /// Layer-2 commands on a physical switch port.
    fn switch_port(
        &mut self,
        store: &mut DeviceStore,
        t: &[&str],
        negated: bool,
        port: &str,
        mut interfaces: BTreeMap<String, InterfaceConfig>,
    ) -> Outcome {
        let id = self.device_id.clone();
        let is_switchport = t[0] == "switchport" || t[0] == "swi";
        let is_stp = t[0] == "spanning-tree" || t[0] == "spa";

        if is_switchport && t.get(1) == Some(&"mode") {
            let mode = match t.get(2) {
                Some(&"access") => PortMode::Access,
                Some(&"trunk") => PortMode::Trunk,
                _ => return Outcome::Unhandled,
            };
            if let Some(entry) = interfaces.get_mut(port) {
                entry.mode = Some(mode);
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if is_switchport && t.get(1) == Some(&"access") && t.get(2) == Some(&"vlan") {
            let vlan = if negated {
                None
            } else {
                match t.get(3).and_then(|v| parse_vlan_id(v)) {
                    Some(vlan) => Some(vlan),
                    None => return Outcome::Reply("% Invalid VLAN number.".to_string()),
                }
            };
            if let Some(entry) = interfaces.get_mut(port) {
                entry.access_vlan = vlan;
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if is_switchport
            && t.get(1) == Some(&"trunk")
            && t.get(2) == Some(&"native")
            && t.get(3) == Some(&"vlan")
        {
            let vlan = if negated {
                None
            } else {
                match t.get(4).and_then(|v| parse_vlan_id(v)) {
                    Some(vlan) => Some(vlan),
                    None => return Outcome::Reply("% Invalid VLAN number.".to_string()),
                }
            };
            if let Some(entry) = interfaces.get_mut(port) {
                entry.native_vlan = vlan;
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if is_switchport
            && t.get(1) == Some(&"trunk")
            && t.get(2) == Some(&"allowed")
            && t.get(3) == Some(&"vlan")
        {
            let Some(entry) = interfaces.get_mut(port) else {
                return Outcome::Unhandled;
            };
            match t.get(4) {
                Some(&"add") => {
                    let added = parse_vlan_list(&t[5..].join(","));
                    entry.trunk_vlans.extend(added);
                }
                Some(&"remove") => {
                    let removed = parse_vlan_list(&t[5..].join(","));
                    entry.trunk_vlans.retain(|v| !removed.contains(v));
                }
                Some(_) => {
                    entry.trunk_vlans = if negated {
                        Default::default()
                    } else {
                        parse_vlan_list(&t[4..].join(","))
                    };
                }
                None => return Outcome::Reply("% Incomplete command.".to_string()),
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if is_stp && t.get(1) == Some(&"portfast") {
            if let Some(entry) = interfaces.get_mut(port) {
                entry.portfast = !negated;
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if is_stp && t.get(1) == Some(&"bpduguard") && t.get(2) == Some(&"enable") {
            if let Some(entry) = interfaces.get_mut(port) {
                entry.bpdu_guard = !negated;
            }
            set_interfaces(store, &id, interfaces);
            return Outcome::Done;
        }
        if t[0] == "channel-group" {
            let Some(group_id) = t.get(1).and_then(|g| g.parse::<u32>().ok()) else {
                return Outcome::Unhandled;
            };
            let Some(device) = store.device(&id) else {
                return Outcome::Unhandled;
            };
            let mut groups = device.config.channel_groups.clone().unwrap_or_default();
            if negated {
                if let Some(group) = groups.iter_mut().find(|g| g.id == group_id) {
                    group.member_ports.retain(|p| p != port);
                }
            } else {
                if !groups.iter().any(|g| g.id == group_id) {
                    groups.push(ChannelGroup {
                        id: group_id,
                        member_ports: Vec::new(),
                        config: None,
                    });
                }
                if let Some(group) = groups.iter_mut().find(|g| g.id == group_id) {
                    if !group.member_ports.iter().any(|p| p == port) {
                        group.member_ports.push(port.to_string());
                    }
                }
            }
            groups.retain(|g| !g.member_ports.is_empty());
            store.merge_config(
                &id,
                ConfigPatch {
                    channel_groups: Patch::Set(groups),
                    ..Default::default()
                },
            );
            return Outcome::Reply(format!("Configuring channel-group {}", group_id));
        }

        Outcome::Unhandled
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliSession;

    fn switch_session() -> (DeviceStore, CliSession) {
        let mut store = DeviceStore::new();
        let id = store.create_device(DeviceKind::Switch);
        let mut session = CliSession::new(id);
        session.submit_line(&mut store, "enable");
        session.submit_line(&mut store, "configure terminal");
        (store, session)
    }

    fn router_session() -> (DeviceStore, CliSession) {
        let mut store = DeviceStore::new();
        let id = store.create_device(DeviceKind::Router);
        let mut session = CliSession::new(id);
        session.submit_line(&mut store, "enable");
        session.submit_line(&mut store, "configure terminal");
        (store, session)
    }

    fn config<'a>(store: &'a DeviceStore, session: &CliSession) -> &'a crate::device::DeviceConfig {
        &store.device(session.device_id()).unwrap().config
    }

    #[test]
    fn test_mode_transitions_and_exit() {
        let mut store = DeviceStore::new();
        let id = store.create_device(DeviceKind::Switch);
        let mut session = CliSession::new(id);
        assert_eq!(session.mode(), CliMode::Exec);

        session.submit_line(&mut store, "enable");
        assert_eq!(session.mode(), CliMode::Privileged);
        session.submit_line(&mut store, "configure terminal");
        assert_eq!(session.mode(), CliMode::Config);
        session.submit_line(&mut store, "vlan 10");
        assert_eq!(session.mode(), CliMode::ConfigVlan);

        session.submit_line(&mut store, "exit");
        assert_eq!(session.mode(), CliMode::Config);
        session.submit_line(&mut store, "exit");
        assert_eq!(session.mode(), CliMode::Privileged);
        session.submit_line(&mut store, "disable");
        assert_eq!(session.mode(), CliMode::Exec);
        // exit at user level is a no-op.
        session.submit_line(&mut store, "exit");
        assert_eq!(session.mode(), CliMode::Exec);
    }

    #[test]
    fn test_vlan_create_name_and_negate() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "vlan 10");
        session.submit_line(&mut store, "name Sales");
        session.submit_line(&mut store, "exit");

        let vlans = config(&store, &session).vlans.clone().unwrap();
        assert_eq!(vlans, vec![Vlan { id: 10, name: "Sales".to_string() }]);

        let lines = session.submit_line(&mut store, "no vlan 10");
        assert_eq!(lines[1], "VLAN 10 removed.");
        assert!(config(&store, &session).vlans.clone().unwrap().is_empty());
    }

    #[test]
    fn test_vlan_id_out_of_range() {
        let (mut store, mut session) = switch_session();
        let lines = session.submit_line(&mut store, "vlan 5000");
        assert_eq!(lines[1], "% Invalid VLAN number.");
        assert!(config(&store, &session).vlans.is_none());
        assert_eq!(session.mode(), CliMode::Config);
    }

    #[test]
    fn test_access_port_configuration() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "interface f0/1");
        assert_eq!(session.mode(), CliMode::ConfigIf);
        session.submit_line(&mut store, "switchport mode access");
        session.submit_line(&mut store, "switchport access vlan 10");
        session.submit_line(&mut store, "spanning-tree portfast");
        session.submit_line(&mut store, "spanning-tree bpduguard enable");
        session.submit_line(&mut store, "no shutdown");

        let interfaces = config(&store, &session).interfaces.clone().unwrap();
        let port = &interfaces["FastEthernet 0/1"];
        assert_eq!(port.mode, Some(PortMode::Access));
        assert_eq!(port.access_vlan, Some(10));
        assert!(port.portfast);
        assert!(port.bpdu_guard);
        assert!(port.up);
    }

    #[test]
    fn test_trunk_allowed_vlan_add_remove_replace() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "interface g0/1");
        session.submit_line(&mut store, "switchport mode trunk");
        session.submit_line(&mut store, "switchport trunk allowed vlan 10,20,30-32");
        session.submit_line(&mut store, "switchport trunk allowed vlan remove 31");
        session.submit_line(&mut store, "switchport trunk allowed vlan add 40");
        session.submit_line(&mut store, "switchport trunk native vlan 99");

        let interfaces = config(&store, &session).interfaces.clone().unwrap();
        let port = &interfaces["GigabitEthernet 0/1"];
        assert_eq!(
            port.trunk_vlans,
            [10, 20, 30, 32, 40].into_iter().collect()
        );
        assert_eq!(port.native_vlan, Some(99));
    }

    #[test]
    fn test_invalid_interface_shorthand() {
        let (mut store, mut session) = switch_session();
        let lines = session.submit_line(&mut store, "interface x9/9");
        assert_eq!(lines[1], "% Invalid interface type and number.");
        assert_eq!(session.mode(), CliMode::Config);
    }

    #[test]
    fn test_management_svi_address() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "interface vlan 99");
        assert_eq!(session.mode(), CliMode::ConfigIf);
        session.submit_line(&mut store, "ip address 10.0.0.5 255.255.255.0");

        let management = config(&store, &session).management.clone().unwrap();
        assert_eq!(management.vlan_id, 99);
        assert_eq!(management.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(management.mask.as_deref(), Some("255.255.255.0"));
    }

    #[test]
    fn test_channel_group_membership() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "interface f0/1");
        let lines = session.submit_line(&mut store, "channel-group 1");
        assert_eq!(lines[1], "Configuring channel-group 1");
        session.submit_line(&mut store, "exit");
        session.submit_line(&mut store, "interface f0/2");
        session.submit_line(&mut store, "channel-group 1");

        let groups = config(&store, &session).channel_groups.clone().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].member_ports,
            vec!["FastEthernet 0/1", "FastEthernet 0/2"]
        );

        // Removing the last member drops the group entirely.
        session.submit_line(&mut store, "no channel-group 1");
        session.submit_line(&mut store, "exit");
        session.submit_line(&mut store, "interface f0/1");
        session.submit_line(&mut store, "no channel-group 1");
        assert!(config(&store, &session)
            .channel_groups
            .clone()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_router_sub_interface_lifecycle() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "interface g0/0.10");
        assert_eq!(session.mode(), CliMode::ConfigSubIf);
        session.submit_line(&mut store, "encapsulation dot1q 10");
        session.submit_line(&mut store, "ip address 192.168.10.1 255.255.255.0");

        let interfaces = config(&store, &session).interfaces.clone().unwrap();
        let sub = &interfaces["GigabitEthernet 0/0"].sub_interfaces[&10];
        assert_eq!(sub.ip.as_deref(), Some("192.168.10.1"));
        assert_eq!(sub.mask.as_deref(), Some("255.255.255.0"));

        // Mismatched encapsulation tag is refused.
        let lines = session.submit_line(&mut store, "encapsulation dot1q 20");
        assert!(lines[1].contains("different VLAN is not allowed"));

        // Negation removes the sub-interface again.
        session.submit_line(&mut store, "no ip address");
        let interfaces = config(&store, &session).interfaces.clone().unwrap();
        assert!(interfaces["GigabitEthernet 0/0"].sub_interfaces.is_empty());
    }

    #[test]
    fn test_static_route_add_conflict_and_negate() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "ip route 10.1.0.0 255.255.0.0 192.168.0.254");
        let lines =
            session.submit_line(&mut store, "ip route 10.1.0.0 255.255.0.0 192.168.0.254");
        assert_eq!(
            lines[1],
            "% Route to 10.1.0.0 via 192.168.0.254 already exists."
        );

        session.submit_line(&mut store, "no ip route 10.1.0.0 255.255.0.0 192.168.0.254");
        assert!(config(&store, &session).static_routes.clone().unwrap().is_empty());

        let lines =
            session.submit_line(&mut store, "no ip route 10.1.0.0 255.255.0.0 192.168.0.254");
        assert_eq!(lines[1], "% Route to 10.1.0.0 via 192.168.0.254 not found.");
    }

    #[test]
    fn test_ospf_process_and_networks() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "router ospf 1");
        assert_eq!(session.mode(), CliMode::ConfigRouter);
        session.submit_line(&mut store, "network 192.168.10.0 0.0.0.255 area 0");
        session.submit_line(&mut store, "exit");

        // A second process id conflicts.
        let lines = session.submit_line(&mut store, "router ospf 2");
        assert_eq!(lines[1], "% OSPF process 1 is already running.");

        let ospf = config(&store, &session).ospf.clone().unwrap();
        assert_eq!(ospf.networks.len(), 1);

        // Negating the running process removes the whole block.
        session.submit_line(&mut store, "no router ospf 1");
        assert!(config(&store, &session).ospf.is_none());
    }

    #[test]
    fn test_bgp_neighbors_replace_by_ip() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "router bgp 65000");
        assert_eq!(session.mode(), CliMode::ConfigRouterBgp);
        session.submit_line(&mut store, "neighbor 10.0.0.2 remote-as 65001");
        session.submit_line(&mut store, "neighbor 10.0.0.2 remote-as 65002");

        let bgp = config(&store, &session).bgp.clone().unwrap();
        assert_eq!(bgp.neighbors.len(), 1);
        assert_eq!(bgp.neighbors[0].remote_as, "65002");

        session.submit_line(&mut store, "no neighbor 10.0.0.2 remote-as 65002");
        assert!(config(&store, &session).bgp.clone().unwrap().neighbors.is_empty());
    }

    #[test]
    fn test_acl_rules_and_negation() {
        let (mut store, mut session) = router_session();
        let lines = session.submit_line(&mut store, "access-list 120");
        assert_eq!(lines[1], "% Invalid access list number.");

        session.submit_line(&mut store, "access-list 10");
        assert_eq!(session.mode(), CliMode::ConfigStdNacl);
        session.submit_line(&mut store, "permit host 192.168.1.5");
        session.submit_line(&mut store, "deny any");
        session.submit_line(&mut store, "permit 10.0.0.0 0.0.0.255");

        let lists = config(&store, &session).access_lists.clone().unwrap();
        assert_eq!(lists[0].rules.len(), 3);
        assert_eq!(lists[0].rules[0].source_wildcard, "0.0.0.0");
        assert_eq!(lists[0].rules[1].source_ip, "0.0.0.0");
        assert_eq!(lists[0].rules[1].source_wildcard, "255.255.255.255");

        // Negating an applied rule removes exactly that rule.
        session.submit_line(&mut store, "no deny any");
        let lists = config(&store, &session).access_lists.clone().unwrap();
        assert_eq!(lists[0].rules.len(), 2);

        let lines = session.submit_line(&mut store, "no deny any");
        assert_eq!(lines[1], "% Rule not found.");

        // `no access-list` from global config drops the whole list.
        session.submit_line(&mut store, "exit");
        session.submit_line(&mut store, "no access-list 10");
        assert!(config(&store, &session).access_lists.clone().unwrap().is_empty());
    }

    #[test]
    fn test_spanning_tree_root_sets_are_exclusive() {
        let (mut store, mut session) = switch_session();
        session.submit_line(&mut store, "spanning-tree mode rapid-pvst");
        session.submit_line(&mut store, "spanning-tree vlan 10,20 root primary");
        session.submit_line(&mut store, "spanning-tree vlan 20 root secondary");

        let stp = config(&store, &session).stp.clone().unwrap();
        assert!(stp.rapid);
        assert_eq!(stp.primary, [10].into_iter().collect());
        assert_eq!(stp.secondary, [20].into_iter().collect());

        session.submit_line(&mut store, "no spanning-tree vlan 10 root primary");
        let stp = config(&store, &session).stp.clone().unwrap();
        assert!(stp.primary.is_empty());
    }

    #[test]
    fn test_negating_unapplied_command_is_diagnostic_only() {
        let (mut store, mut session) = router_session();
        let before = config(&store, &session).clone();
        let lines = session.submit_line(&mut store, "no ip route 1.2.3.0 255.255.255.0 9.9.9.9");
        assert!(lines[1].starts_with('%'));
        assert_eq!(config(&store, &session), &before);
    }

    #[test]
    fn test_show_commands_render_json() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "hostname R1");
        session.submit_line(&mut store, "exit");
        let lines = session.submit_line(&mut store, "show running-config");
        assert!(lines[1].contains("\"hostname\": \"R1\""));

        let lines = session.submit_line(&mut store, "show ip route");
        assert!(lines[1].contains("\"static\""));
    }

    #[test]
    fn test_switchport_rejected_on_router() {
        let (mut store, mut session) = router_session();
        session.submit_line(&mut store, "interface g0/0");
        let lines = session.submit_line(&mut store, "switchport mode access");
        assert_eq!(
            lines[1],
            "% Unrecognized command: \"switchport mode access\""
        );
    }
}
