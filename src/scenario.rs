//! Scenario file format and validation.
//!
//! A scenario is the batch-mode description of a topology: devices by
//! handle, cabling between named ports, and per-device CLI scripts. The
//! file is YAML and is validated as a whole before the orchestrator touches
//! the store, so a bad scenario never leaves a half-built topology behind.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use color_eyre::Result;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("duplicate device handle '{0}'")]
    DuplicateHandle(String),
    #[error("link references unknown device '{0}'")]
    UnknownDevice(String),
    #[error("device '{device}' has no port named '{port}'")]
    UnknownPort { device: String, port: String },
    #[error("port '{port}' on device '{device}' is already linked")]
    PortAlreadyLinked { device: String, port: String },
    #[error("cli script targets unknown device '{0}'")]
    UnknownScriptDevice(String),
}

/// How a PC obtains its address once the topology is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    #[default]
    Static,
    Dhcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDevice {
    /// Scenario-local handle used by links and scripts; not the label.
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub addressing: Addressing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioLink {
    pub a: String,
    pub a_port: String,
    pub b: String,
    pub b_port: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioScript {
    pub device: String,
    #[serde(default)]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub devices: Vec<ScenarioDevice>,
    #[serde(default)]
    pub links: Vec<ScenarioLink>,
    #[serde(default)]
    pub cli: Vec<ScenarioScript>,
}

impl Scenario {
    /// Checks internal consistency: unique handles, known endpoints, valid
    /// port names, and at most one cable per port.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut kinds: HashMap<&str, DeviceKind> = HashMap::new();
        for device in &self.devices {
            if kinds.insert(&device.name, device.kind).is_some() {
                return Err(ScenarioError::DuplicateHandle(device.name.clone()));
            }
        }

        let mut used_ports: HashSet<(&str, &str)> = HashSet::new();
        for link in &self.links {
            for (handle, port) in [(&link.a, &link.a_port), (&link.b, &link.b_port)] {
                let Some(kind) = kinds.get(handle.as_str()) else {
                    return Err(ScenarioError::UnknownDevice(handle.clone()));
                };
                if !kind.ports().contains(port) {
                    return Err(ScenarioError::UnknownPort {
                        device: handle.clone(),
                        port: port.clone(),
                    });
                }
                if !used_ports.insert((handle, port)) {
                    return Err(ScenarioError::PortAlreadyLinked {
                        device: handle.clone(),
                        port: port.clone(),
                    });
                }
            }
        }

        for script in &self.cli {
            if !kinds.contains_key(script.device.as_str()) {
                return Err(ScenarioError::UnknownScriptDevice(script.device.clone()));
            }
        }
        Ok(())
    }
}

/// Load and validate a scenario from a YAML file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    info!("Loading scenario from: {:?}", path);
    let file = File::open(path)?;
    let scenario: Scenario = serde_yaml::from_reader(file)?;
    scenario.validate()?;
    info!(
        "Scenario loaded: {} devices, {} links, {} scripts",
        scenario.devices.len(),
        scenario.links.len(),
        scenario.cli.len()
    );
    Ok(scenario)
}
