//! Integration tests for placement resolution.
//!
//! # Test Strategy
//!
//! 1. **Ordering**: locations follow the cluster's acting order
//! 2. **Failures**: empty acting sets and vanished pools are errors, never
//!    empty lists
//! 3. **Hostnames**: reverse lookups with and without records

use std::net::IpAddr;
use std::sync::Arc;

use corelib::{PlacementError, Pool};
use placement::{ClusterClient, MemoryCluster, PlacementResolver, StaticHosts};

fn cluster() -> MemoryCluster {
    MemoryCluster::new()
        .with_device(0, "10.0.0.1:6800/1001")
        .with_device(1, "10.0.0.2:6800/1002")
        .with_device(2, "[v2:10.0.0.3:6800/1003,v1:10.0.0.3:6801/1003]")
        .with_device(3, "10.0.0.4:6800/1004")
        .with_pool("rbd", 32, 3)
        .with_pool("data", 64, 3)
}

fn hosts() -> StaticHosts {
    (1..=4).fold(StaticHosts::new(), |hosts, i| {
        let ip: IpAddr = format!("10.0.0.{i}").parse().unwrap();
        hosts.with_host(ip, format!("osd-node{i}.example.org"))
    })
}

async fn open(cluster: &MemoryCluster, name: &str) -> Pool {
    let id = cluster.open_pool(name).await.unwrap();
    Pool::opened(name, id)
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[tokio::test]
async fn test_locations_follow_acting_order() {
    let cluster = Arc::new(cluster());
    let pool = open(&cluster, "data").await;
    let resolver = PlacementResolver::new(cluster.clone(), Arc::new(hosts()));

    for i in 0..20 {
        let object = format!("/data/run{i}/file.root");
        let placement = cluster
            .object_placement(pool.id.unwrap(), &object)
            .await
            .unwrap()
            .unwrap();
        let locations = resolver.locate(&pool, &object).await.unwrap();

        let ids: Vec<i64> = locations.iter().map(|l| l.device_id).collect();
        assert_eq!(ids, placement.acting, "order differs for {object}");
    }
}

#[tokio::test]
async fn test_location_endpoints() {
    let cluster = Arc::new(cluster().with_acting("rbd", vec![2, 0]));
    let pool = open(&cluster, "rbd").await;
    let resolver = PlacementResolver::new(cluster, Arc::new(hosts()));

    let locations = resolver.locate(&pool, "image.0001").await.unwrap();

    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].ip, "10.0.0.3:1094");
    assert_eq!(locations[0].hostname, "osd-node3.example.org:1094");
    assert_eq!(locations[1].ip, "10.0.0.1:1094");
    assert_eq!(locations[1].device_id, 0);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_empty_acting_set_is_an_error() {
    let cluster = Arc::new(cluster().with_acting("data", Vec::new()));
    let pool = open(&cluster, "data").await;
    let resolver = PlacementResolver::new(cluster, Arc::new(hosts()));

    let err = resolver.locate(&pool, "/data/file1").await.unwrap_err();
    assert!(matches!(err, PlacementError::NoDevices { .. }));
}

#[tokio::test]
async fn test_only_holes_is_an_error() {
    let cluster = Arc::new(cluster().with_acting("data", vec![-1, -1]));
    let pool = open(&cluster, "data").await;
    let resolver = PlacementResolver::new(cluster, Arc::new(hosts()));

    let err = resolver.locate(&pool, "/data/file1").await.unwrap_err();
    assert!(matches!(err, PlacementError::NoDevices { .. }));
}

#[tokio::test]
async fn test_pool_removed_after_open() {
    let cluster = Arc::new(cluster());
    let pool = open(&cluster, "rbd").await;
    let resolver = PlacementResolver::new(cluster.clone(), Arc::new(hosts()));

    assert!(resolver.locate(&pool, "obj").await.is_ok());
    cluster.remove_pool("rbd");

    match resolver.locate(&pool, "obj").await {
        Err(PlacementError::UnknownPlacementGroup { pool, object }) => {
            assert_eq!(pool, "rbd");
            assert_eq!(object, "obj");
        }
        other => panic!("expected UnknownPlacementGroup, got {other:?}"),
    }
}

// ============================================================================
// Hostname Tests
// ============================================================================

#[tokio::test]
async fn test_missing_reverse_record_uses_ip() {
    let cluster = Arc::new(cluster().with_acting("rbd", vec![3]));
    let pool = open(&cluster, "rbd").await;
    let resolver = PlacementResolver::new(cluster, Arc::new(StaticHosts::new()));

    let locations = resolver.locate(&pool, "obj").await.unwrap();
    assert_eq!(locations[0].hostname, "10.0.0.4:1094");
}
