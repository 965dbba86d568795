//! Prefix routing from logical paths to storage pools.
//!
//! Bindings are configured once as `<prefix>:<pool>` tokens and are read-only
//! afterwards. Resolution is a byte-wise prefix match; it is not aware of
//! path segments, so `/data` also matches `/database/x`.

pub mod pool;
pub mod table;

pub use pool::{Pool, PoolId};
pub use table::{MatchPolicy, PoolBinding, PrefixRoutingTable, ROOT_PREFIX};
