//! Object placement resolution.
//!
//! Turns `(pool, object)` into the ordered list of endpoints currently
//! responsible for the object.
//!
//! # Algorithm
//!
//! 1. Ask the cluster for the object's placement group and acting devices
//! 2. Drop holes (negative ids) but keep the order: primary first
//! 3. Fetch every device address from the cluster's live map
//! 4. Strip port and nonce, reverse-resolve the IP
//! 5. Append the service port to both IP and hostname

use std::net::IpAddr;
use std::sync::Arc;

use corelib::device::host_part;
use corelib::{Location, PlacementError, Pool, DEFAULT_SERVICE_PORT};
use metrics::counter;
use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::hosts::HostResolver;

/// Resolves objects to device endpoints through a cluster client.
pub struct PlacementResolver {
    client: Arc<dyn ClusterClient>,
    hosts: Arc<dyn HostResolver>,
    port: u16,
}

impl PlacementResolver {
    pub fn new(client: Arc<dyn ClusterClient>, hosts: Arc<dyn HostResolver>) -> Self {
        Self {
            client,
            hosts,
            port: DEFAULT_SERVICE_PORT,
        }
    }

    /// Use `port` instead of the default service port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client(&self) -> &Arc<dyn ClusterClient> {
        &self.client
    }

    /// Ordered, non-empty list of locations for `object` in `pool`.
    pub async fn locate(&self, pool: &Pool, object: &str) -> Result<Vec<Location>, PlacementError> {
        let id = pool
            .id
            .ok_or_else(|| PlacementError::NoSuchPool(pool.name.clone()))?;

        let placement = self
            .client
            .object_placement(id, object)
            .await?
            .ok_or_else(|| PlacementError::UnknownPlacementGroup {
                pool: pool.name.clone(),
                object: object.to_string(),
            })?;

        let devices: Vec<i64> = placement.acting.iter().copied().filter(|d| *d >= 0).collect();
        if devices.is_empty() {
            counter!("cephloc_placement_empty_total").increment(1);
            return Err(PlacementError::NoDevices {
                pgid: placement.pgid.to_string(),
            });
        }

        let addresses = self.client.device_addresses(&devices).await?;
        let mut locations = Vec::with_capacity(devices.len());
        for (device, address) in devices.iter().zip(addresses) {
            let address = address.ok_or_else(|| {
                PlacementError::Cluster(format!("osd.{device} has no address in the cluster map"))
            })?;
            let (ip, hostname) = self.endpoint(host_part(&address)).await;
            locations.push(Location::new(&ip, &hostname, self.port, *device));
        }

        debug!(
            pool = %pool.name,
            object,
            pgid = %placement.pgid,
            primary = %locations[0],
            replicas = locations.len() - 1,
            "located object"
        );
        Ok(locations)
    }

    /// IP and hostname for a bare host taken from the cluster map. Falls back
    /// to the input when lookups fail.
    async fn endpoint(&self, host: &str) -> (String, String) {
        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => self.hosts.forward(host).await,
        };
        let Some(ip) = ip else {
            warn!(host, "device address does not resolve");
            return (host.to_string(), host.to_string());
        };
        let hostname = match self.hosts.reverse(ip).await {
            Some(name) => name,
            None => {
                debug!(%ip, "no reverse record, using address as hostname");
                ip.to_string()
            }
        };
        (ip.to_string(), hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;
    use crate::hosts::StaticHosts;
    use corelib::PoolId;

    fn resolver(cluster: MemoryCluster) -> PlacementResolver {
        let hosts = StaticHosts::new()
            .with_host("10.0.0.1".parse().unwrap(), "node1")
            .with_host("10.0.0.2".parse().unwrap(), "node2");
        PlacementResolver::new(Arc::new(cluster), Arc::new(hosts))
    }

    #[tokio::test]
    async fn test_unopened_pool_is_no_such_pool() {
        let resolver = resolver(MemoryCluster::new().with_pool("data", 8, 2));
        let err = resolver
            .locate(&Pool::unopened("data"), "/data/x")
            .await
            .unwrap_err();
        assert_eq!(err, PlacementError::NoSuchPool("data".into()));
    }

    #[tokio::test]
    async fn test_pool_missing_from_map() {
        let resolver = resolver(MemoryCluster::new());
        let err = resolver
            .locate(&Pool::opened("ghost", PoolId(42)), "/x")
            .await
            .unwrap_err();
        assert!(matches!(err, PlacementError::UnknownPlacementGroup { .. }));
    }

    #[tokio::test]
    async fn test_holes_are_skipped_in_order() {
        let cluster = MemoryCluster::new()
            .with_device(0, "10.0.0.1:6800/1")
            .with_device(1, "10.0.0.2:6800/1")
            .with_pool("ec", 4, 3)
            .with_acting("ec", vec![1, -1, 0]);
        let resolver = resolver(cluster);
        let locations = resolver
            .locate(&Pool::opened("ec", PoolId(1)), "obj")
            .await
            .unwrap();
        let ids: Vec<i64> = locations.iter().map(|l| l.device_id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(locations[0].hostname, "node2:1094");
    }

    #[tokio::test]
    async fn test_device_without_address_fails() {
        let cluster = MemoryCluster::new()
            .with_unaddressed_device(5)
            .with_pool("data", 4, 1);
        let err = resolver(cluster)
            .locate(&Pool::opened("data", PoolId(1)), "obj")
            .await
            .unwrap_err();
        assert!(matches!(err, PlacementError::Cluster(_)));
    }

    #[tokio::test]
    async fn test_custom_port() {
        let cluster = MemoryCluster::new()
            .with_device(0, "10.0.0.1:6800/1")
            .with_pool("data", 4, 1);
        let resolver = resolver(cluster).with_port(2094);
        let locations = resolver
            .locate(&Pool::opened("data", PoolId(1)), "obj")
            .await
            .unwrap();
        assert_eq!(locations[0].ip, "10.0.0.1:2094");
        assert_eq!(locations[0].hostname, "node1:2094");
    }
}
