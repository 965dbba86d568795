//! In-process cluster with a deterministic distribution function.
//!
//! Objects hash to a placement-group seed with xxh3; each placement group's
//! acting set is a run of consecutive devices starting at a position derived
//! from the pool id and seed. Individual placement groups can be pinned to
//! an explicit acting set, and pools can be removed at runtime to simulate a
//! cluster map that moved on.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use corelib::{Error, PlacementError, PoolId};
use parking_lot::RwLock;
use xxhash_rust::xxh3::xxh3_64;

use super::{ClusterClient, PgId, Placement};

#[derive(Debug, Clone)]
struct MemoryPool {
    id: PoolId,
    name: String,
    pg_num: u32,
    size: usize,
    pinned: HashMap<u32, Vec<i64>>,
}

#[derive(Debug, Default)]
struct ClusterState {
    pools: Vec<MemoryPool>,
    devices: BTreeMap<i64, Option<String>>,
    unreachable: bool,
    next_pool_id: i64,
}

/// Deterministic in-memory stand-in for a storage cluster.
///
/// # Example
///
/// ```rust
/// use placement::MemoryCluster;
///
/// let cluster = MemoryCluster::new()
///     .with_device(0, "10.0.0.1:6800/1")
///     .with_device(1, "10.0.0.2:6800/1")
///     .with_pool("data", 32, 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: RwLock<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with its raw cluster address.
    pub fn with_device(mut self, id: i64, address: impl Into<String>) -> Self {
        self.state.get_mut().devices.insert(id, Some(address.into()));
        self
    }

    /// Add a device the cluster map has no address for.
    pub fn with_unaddressed_device(mut self, id: i64) -> Self {
        self.state.get_mut().devices.insert(id, None);
        self
    }

    /// Add a pool with `pg_num` placement groups and `size` replicas. Pool
    /// ids are assigned from 1 in insertion order.
    pub fn with_pool(mut self, name: impl Into<String>, pg_num: u32, size: usize) -> Self {
        let state = self.state.get_mut();
        state.next_pool_id += 1;
        state.pools.push(MemoryPool {
            id: PoolId(state.next_pool_id),
            name: name.into(),
            pg_num: pg_num.max(1),
            size,
            pinned: HashMap::new(),
        });
        self
    }

    /// Pin every placement group of `pool` to `acting`.
    pub fn with_acting(mut self, pool: &str, acting: Vec<i64>) -> Self {
        if let Some(pool) = self.state.get_mut().pools.iter_mut().find(|p| p.name == pool) {
            for seed in 0..pool.pg_num {
                pool.pinned.insert(seed, acting.clone());
            }
        }
        self
    }

    /// Make every connection-level query fail.
    pub fn unreachable(mut self) -> Self {
        self.state.get_mut().unreachable = true;
        self
    }

    /// Drop a pool from the live map. Returns false if it was not present.
    pub fn remove_pool(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let before = state.pools.len();
        state.pools.retain(|p| p.name != name);
        state.pools.len() != before
    }

    /// Placement group an object falls into, for assertions in tests.
    pub fn pg_for(&self, pool: &str, object: &str) -> Option<PgId> {
        let state = self.state.read();
        let pool = state.pools.iter().find(|p| p.name == pool)?;
        Some(PgId {
            pool: pool.id,
            seed: seed_for(pool, object),
        })
    }
}

fn seed_for(pool: &MemoryPool, object: &str) -> u32 {
    (xxh3_64(object.as_bytes()) % u64::from(pool.pg_num)) as u32
}

fn acting_for(pool: &MemoryPool, seed: u32, devices: &BTreeMap<i64, Option<String>>) -> Vec<i64> {
    if let Some(pinned) = pool.pinned.get(&seed) {
        return pinned.clone();
    }
    let ids: Vec<i64> = devices.keys().copied().collect();
    if ids.is_empty() {
        return Vec::new();
    }
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&pool.id.0.to_le_bytes());
    key[8..].copy_from_slice(&seed.to_le_bytes());
    let start = (xxh3_64(&key) % ids.len() as u64) as usize;
    (0..pool.size.min(ids.len()))
        .map(|i| ids[(start + i) % ids.len()])
        .collect()
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn list_pools(&self) -> corelib::Result<Vec<String>> {
        let state = self.state.read();
        if state.unreachable {
            return Err(Error::ClusterConnect("cluster unreachable".into()));
        }
        Ok(state.pools.iter().map(|p| p.name.clone()).collect())
    }

    async fn open_pool(&self, name: &str) -> corelib::Result<PoolId> {
        let state = self.state.read();
        if state.unreachable {
            return Err(Error::ClusterConnect("cluster unreachable".into()));
        }
        state
            .pools
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| Error::Config(format!("pool {name} does not exist")))
    }

    async fn object_placement(
        &self,
        pool: PoolId,
        object: &str,
    ) -> Result<Option<Placement>, PlacementError> {
        let state = self.state.read();
        let Some(pool) = state.pools.iter().find(|p| p.id == pool) else {
            return Ok(None);
        };
        let seed = seed_for(pool, object);
        Ok(Some(Placement {
            pgid: PgId { pool: pool.id, seed },
            acting: acting_for(pool, seed, &state.devices),
        }))
    }

    async fn device_address(&self, device: i64) -> Result<Option<String>, PlacementError> {
        Ok(self.state.read().devices.get(&device).cloned().flatten())
    }

    fn name(&self) -> &'static str {
        "MemoryCluster"
    }
}
