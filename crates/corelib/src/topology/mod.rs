//! Cluster topology cache.
//!
//! A `TopologySnapshot` is an immutable point-in-time mapping from device id
//! to `TopologyRecord`. The `SnapshotStore` publishes whole snapshots by
//! swapping an `Arc`, so readers always see one complete snapshot.
//!
//! The cache is diagnostic: live placement asks the cluster client directly.

pub mod parser;
pub mod snapshot;

pub use parser::{parse_dump, parse_line};
pub use snapshot::{SnapshotStore, TopologySnapshot};
