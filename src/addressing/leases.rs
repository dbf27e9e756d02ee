//! DHCP lease bookkeeping.
//!
//! Pools are keyed by (router label, VLAN id). Allocation is deterministic:
//! the first free address strictly between the network and broadcast
//! addresses, skipping the router's excluded set and existing leases. A
//! host holds at most one lease across all pools at any time.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::addressing::calc::{int_to_ip, ip_to_int, network_info};
use crate::addressing::engine::auto_excluded_addresses;
use crate::device::{DeviceId, NetworkDevice};

/// An address handed to a host, with the pool's subnet mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lease {
    pub ip: String,
    pub mask: String,
}

type PoolKey = (String, u16);

/// All active leases, grouped per router+VLAN pool.
#[derive(Debug, Default)]
pub struct LeaseTable {
    /// Pool key to leased-address (numeric, for ordered scans) to holder.
    pools: BTreeMap<PoolKey, BTreeMap<u32, DeviceId>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a lease for `host_id` from the pool a router serves for
    /// `vlan_id`.
    ///
    /// Idempotent: a host that already holds a lease in this pool gets the
    /// same address back. Otherwise any lease the host holds elsewhere is
    /// released first, then the first free address is assigned. Returns
    /// `None` when the router has no usable sub-interface for the VLAN or
    /// the pool is exhausted.
    pub fn request(
        &mut self,
        host_id: &str,
        router: &NetworkDevice,
        vlan_id: u16,
    ) -> Option<Lease> {
        let sub = router
            .config
            .interfaces
            .as_ref()?
            .values()
            .find_map(|iface| iface.sub_interfaces.get(&vlan_id))?;
        let (Some(gateway_ip), Some(mask)) = (&sub.ip, &sub.mask) else {
            return None;
        };

        let key: PoolKey = (router.label.clone(), vlan_id);
        if let Some(pool) = self.pools.get(&key) {
            if let Some((&ip, _)) = pool.iter().find(|(_, holder)| holder.as_str() == host_id) {
                return Some(Lease {
                    ip: int_to_ip(ip),
                    mask: mask.clone(),
                });
            }
        }
        self.release(host_id);

        let info = network_info(gateway_ip, mask)?;
        let network = ip_to_int(&info.network).ok()?;
        let broadcast = ip_to_int(&info.broadcast).ok()?;

        // The stored excluded set is the form's auto ∪ manual union; re-derive
        // the auto part so CLI-built routers honor the same invariant.
        let mut excluded = auto_excluded_addresses(&router.config);
        if let Some(manual) = &router.config.dhcp_excluded {
            excluded.extend(manual.iter().cloned());
        }

        let pool = self.pools.entry(key).or_default();
        for candidate in network.saturating_add(1)..broadcast {
            if pool.contains_key(&candidate) {
                continue;
            }
            let candidate_ip = int_to_ip(candidate);
            if excluded.contains(&candidate_ip) {
                continue;
            }
            pool.insert(candidate, host_id.to_string());
            info!(
                "Leased {} to {} from pool {}/VLAN {}",
                candidate_ip, host_id, router.label, vlan_id
            );
            return Some(Lease {
                ip: candidate_ip,
                mask: mask.clone(),
            });
        }
        debug!("Pool {}/VLAN {} exhausted", router.label, vlan_id);
        None
    }

    /// Releases whatever lease the host currently holds, if any.
    pub fn release(&mut self, host_id: &str) {
        for ((label, vlan), pool) in self.pools.iter_mut() {
            if let Some((&ip, _)) = pool.iter().find(|(_, holder)| holder.as_str() == host_id) {
                pool.remove(&ip);
                debug!(
                    "Released {} held by {} in pool {}/VLAN {}",
                    int_to_ip(ip),
                    host_id,
                    label,
                    vlan
                );
                return;
            }
        }
    }

    /// The lease a host currently holds, with its pool key.
    pub fn lease_of(&self, host_id: &str) -> Option<(&PoolKey, String)> {
        for (key, pool) in &self.pools {
            for (&ip, holder) in pool {
                if holder == host_id {
                    return Some((key, int_to_ip(ip)));
                }
            }
        }
        None
    }

    /// Snapshot of every active lease as (router label, vlan, ip, holder).
    pub fn all_leases(&self) -> Vec<(String, u16, String, DeviceId)> {
        let mut out = Vec::new();
        for ((label, vlan), pool) in &self.pools {
            for (&ip, holder) in pool {
                out.push((label.clone(), *vlan, int_to_ip(ip), holder.clone()));
            }
        }
        out
    }
}
