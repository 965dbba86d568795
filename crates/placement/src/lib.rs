//! Placement resolution for Ceph pools.
//!
//! This crate asks the storage cluster where an object lives and turns the
//! answer into reachable endpoints:
//! - Which placement group an object maps to
//! - Which devices act for that group, primary first
//! - Which IP and hostname each device answers on

pub mod cluster;
pub mod hosts;
pub mod resolver;

pub use cluster::{CephCli, CephCliOptions, ClusterClient, MemoryCluster, PgId, Placement};
pub use hosts::{DnsResolver, HostResolver, StaticHosts};
pub use resolver::PlacementResolver;
