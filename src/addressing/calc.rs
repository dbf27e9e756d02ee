//! IPv4 address arithmetic.
//!
//! Pure functions over dotted-quad address strings and subnet masks.
//! Every other module builds on these: the cascade logic, the DHCP lease
//! scanner and the exporter all derive network boundaries from here.

use thiserror::Error;

/// Errors produced when parsing dotted-quad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid IPv4 address format: {0}")]
    InvalidFormat(String),
}

/// Derived boundaries of one subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub network: String,
    pub broadcast: String,
    /// Conventionally the first usable host address (network + 1).
    pub first_usable: String,
    pub usable_hosts: u32,
}

/// Converts an IPv4 address string to its 32-bit integer representation.
///
/// Octets with leading zeros (`"01"`, `"007"`) are rejected so that every
/// accepted address has exactly one spelling and the int round-trip is
/// canonical.
pub fn ip_to_int(ip: &str) -> Result<u32, AddressError> {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(AddressError::InvalidFormat(ip.to_string()));
    }
    let mut value: u32 = 0;
    for octet in octets {
        let parsed: u32 = octet
            .parse()
            .map_err(|_| AddressError::InvalidFormat(ip.to_string()))?;
        if parsed > 255 || (octet.len() > 1 && octet.starts_with('0')) {
            return Err(AddressError::InvalidFormat(ip.to_string()));
        }
        value = (value << 8) | parsed;
    }
    Ok(value)
}

/// Converts a 32-bit integer representation back to its dotted-quad string.
pub fn int_to_ip(value: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        value >> 24,
        (value >> 16) & 255,
        (value >> 8) & 255,
        value & 255
    )
}

/// Returns true iff the mask is a contiguous run of 1-bits followed by 0-bits.
pub fn is_valid_mask(mask: &str) -> bool {
    let Ok(bits) = ip_to_int(mask) else {
        return false;
    };
    // Inverting a valid mask yields 2^n - 1, so adding one gives a power of two.
    let inverted = !bits;
    inverted.wrapping_add(1) & inverted == 0
}

/// Calculates network information for an address/mask pair.
///
/// Returns `None` when either input is malformed or the mask is not a
/// contiguous prefix; callers treat that as "nothing to derive", never as
/// an error.
pub fn network_info(ip: &str, mask: &str) -> Option<NetworkInfo> {
    if !is_valid_mask(mask) {
        return None;
    }
    let ip_bits = ip_to_int(ip).ok()?;
    let mask_bits = ip_to_int(mask).ok()?;
    let network = ip_bits & mask_bits;
    let broadcast = network | !mask_bits;
    let prefix_len = mask_bits.count_ones();
    let total_hosts = if prefix_len >= 32 {
        1u64
    } else {
        1u64 << (32 - prefix_len)
    };
    Some(NetworkInfo {
        network: int_to_ip(network),
        broadcast: int_to_ip(broadcast),
        first_usable: int_to_ip(network.wrapping_add(1)),
        usable_hosts: if total_hosts > 2 {
            (total_hosts - 2) as u32
        } else {
            0
        },
    })
}
