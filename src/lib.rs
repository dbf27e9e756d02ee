//! # Netlab - virtual network topology builder
//!
//! This library models small lab topologies of routers, switches and PCs,
//! interprets a vendor-style command line against them, derives addressing
//! (subnet math, VLAN sub-interface chains, DHCP leases, gateway
//! resolution) and renders startup-config text per device.
//!
//! ## Overview
//!
//! Netlab builds and addresses a topology without any real equipment. A
//! scenario file (or an embedding caller) creates devices, cables their
//! ports and drives configuration either through typed patches or by
//! replaying CLI command lines; the engine then answers the derived
//! questions: which addresses may a DHCP pool hand out, which router
//! serves a host's VLAN, what does the startup-config look like.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `device`: device data model, the configuration patch type and the
//!   authoritative in-memory store
//! - `addressing`: dotted-quad subnet math, sub-interface cascading, DHCP
//!   lease pools and gateway resolution
//! - `cli`: the modal command interpreter (grammar trie, completion,
//!   history, per-mode execution)
//! - `export`: startup-config text rendering per device kind
//! - `scenario`: the YAML scenario file format and its validation
//! - `orchestrator`: end-to-end scenario replay and output generation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use netlab::orchestrator::Orchestrator;
//! use netlab::scenario::load_scenario;
//!
//! # fn main() -> color_eyre::Result<()> {
//! let scenario = load_scenario(Path::new("lab.yaml"))?;
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.run(&scenario);
//! orchestrator.write_outputs(Path::new("netlab_output"), false)?;
//! # Ok(())
//! # }
//! ```

pub mod addressing;
pub mod cli;
pub mod device;
pub mod export;
pub mod orchestrator;
pub mod scenario;
