//! Core library for the Ceph object locator.
//!
//! This crate provides the building blocks shared by the placement resolver,
//! the topology refresher and the location service:
//! - Device records and the topology dump parser
//! - The swap-publish topology snapshot store
//! - Pool handles and the prefix routing table
//! - Resolved locations and the error taxonomy

pub mod device;
pub mod error;
pub mod location;
pub mod routing;
pub mod topology;

pub use device::{DeviceId, TopologyRecord};
pub use error::{Error, PlacementError, Result};
pub use location::{Location, DEFAULT_SERVICE_PORT};
pub use routing::{MatchPolicy, Pool, PoolBinding, PoolId, PrefixRoutingTable, ROOT_PREFIX};
pub use topology::{SnapshotStore, TopologySnapshot};
