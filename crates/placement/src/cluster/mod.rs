//! Storage-cluster client abstraction.
//!
//! The cluster owns the distribution function: it maps an object to a
//! placement group and a placement group to its acting devices. This crate
//! never recomputes that mapping; it only asks for it.
//!
//! - **CephCli**: talks to a live cluster through the `ceph` command
//! - **MemoryCluster**: deterministic in-process cluster for tests and demos

pub mod ceph;
pub mod memory;

pub use ceph::{CephCli, CephCliOptions};
pub use memory::MemoryCluster;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use corelib::{PlacementError, PoolId};

/// Placement group identifier, `<pool>.<seed>` with the seed in hex.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PgId {
    pub pool: PoolId,
    pub seed: u32,
}

impl fmt::Display for PgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:x}", self.pool, self.seed)
    }
}

impl FromStr for PgId {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlacementError::Cluster(format!("malformed placement group id {s:?}"));
        let (pool, seed) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            pool: PoolId(pool.parse().map_err(|_| invalid())?),
            seed: u32::from_str_radix(seed, 16).map_err(|_| invalid())?,
        })
    }
}

/// Where the cluster currently places one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub pgid: PgId,
    /// Acting devices, primary first. Negative entries are holes left by
    /// the distribution function and name no device.
    pub acting: Vec<i64>,
}

/// Queries the placement layer answers on behalf of a storage cluster.
///
/// Implementations must be thread-safe; one client is shared by every
/// request.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Pool names in the cluster's own order.
    async fn list_pools(&self) -> corelib::Result<Vec<String>>;

    /// Resolve a pool name to the id used for placement queries.
    async fn open_pool(&self, name: &str) -> corelib::Result<PoolId>;

    /// Placement of `object` in `pool`. `Ok(None)` means the pool is not in
    /// the cluster's live map.
    async fn object_placement(
        &self,
        pool: PoolId,
        object: &str,
    ) -> Result<Option<Placement>, PlacementError>;

    /// Raw address of one device as the cluster map records it, for example
    /// `10.0.0.5:6800/123`. `Ok(None)` when the map has no address for it.
    async fn device_address(&self, device: i64) -> Result<Option<String>, PlacementError>;

    /// Addresses for several devices, in the order given.
    async fn device_addresses(
        &self,
        devices: &[i64],
    ) -> Result<Vec<Option<String>>, PlacementError> {
        let mut addresses = Vec::with_capacity(devices.len());
        for device in devices {
            addresses.push(self.device_address(*device).await?);
        }
        Ok(addresses)
    }

    /// Client name (for logging/debugging).
    fn name(&self) -> &'static str;
}
