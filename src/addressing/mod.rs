//! Addressing and DHCP subsystem.
//!
//! Subnet math lives in [`calc`], topology-aware derivations (auto
//! exclusions, sub-interface cascading, gateway resolution) in [`engine`],
//! and the lease bookkeeping in [`leases`].

pub mod calc;
pub mod engine;
pub mod leases;

pub use calc::{int_to_ip, ip_to_int, is_valid_mask, network_info, AddressError, NetworkInfo};
pub use engine::{auto_excluded_addresses, cascade_sub_interfaces, resolve_gateway_for_host, GatewayInfo};
pub use leases::{Lease, LeaseTable};
