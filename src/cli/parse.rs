//! Token-level parsing helpers for the interpreter.

use std::collections::BTreeSet;

use regex::Regex;

use crate::device::parse_vlan_id;

/// Parses a VLAN list such as `10,20,30-32` into {10,20,30,31,32}.
///
/// Order-insensitive, duplicates collapsed; parts that are not valid VLAN
/// ids (or inverted ranges) are ignored.
pub fn parse_vlan_list(list: &str) -> BTreeSet<u16> {
    let mut vlans = BTreeSet::new();
    for part in list.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            if let (Some(start), Some(end)) = (parse_vlan_id(start), parse_vlan_id(end)) {
                for id in start..=end {
                    vlans.insert(id);
                }
            }
        } else if let Some(id) = parse_vlan_id(part) {
            vlans.insert(id);
        }
    }
    vlans
}

/// Expands a vendor-style interface shorthand to a canonical port name.
///
/// `g0/1` matches the first port whose letter prefix starts with `g`
/// (case-insensitive) and whose numeral suffix is exactly `0/1`; a dotted
/// sub-interface suffix (`g0/1.10`) is carried through the expansion.
/// Returns `None` when nothing matches.
pub fn expand_interface_name(ports: &[String], shorthand: &str) -> Option<String> {
    let (physical, sub_id) = match shorthand.split_once('.') {
        Some((physical, sub)) => (physical, Some(sub)),
        None => (shorthand, None),
    };

    let pattern = Regex::new(r"^([A-Za-z]+)\s*(\d.*)$").ok()?;
    let captures = pattern.captures(physical)?;
    let letters = captures.get(1)?.as_str().to_ascii_lowercase();
    let numerals = captures.get(2)?.as_str();

    let full = ports.iter().find(|port| {
        let Some((name, suffix)) = port.split_once(' ') else {
            return false;
        };
        name.to_ascii_lowercase().starts_with(&letters) && suffix == numerals
    })?;

    Some(match sub_id {
        Some(sub) => format!("{}.{}", full, sub),
        None => full.clone(),
    })
}
