//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration, routing and placement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed binding token, unreadable settings, or an empty pool set.
    #[error("configuration error: {0}")]
    Config(String),

    /// The cluster client could not initialise, connect or read its config.
    #[error("cluster connection failed: {0}")]
    ClusterConnect(String),

    /// No routing-table entry matches the request path.
    #[error("no pool is bound to a prefix of {0}")]
    NoPoolForPath(String),

    /// A topology refresh cycle failed. Never fatal to the refresher.
    #[error("topology refresh failed: {0}")]
    RefreshCycle(String),

    /// The cluster could not place the object.
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Failures of a single placement query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// The pool handle was never opened against the cluster.
    #[error("pool {0} has no open I/O context")]
    NoSuchPool(String),

    /// The cluster's live map does not contain the pool.
    #[error("pool {pool} is not present in the cluster map (object {object})")]
    UnknownPlacementGroup {
        /// Pool name as configured.
        pool: String,
        /// Object that was being placed.
        object: String,
    },

    /// The placement group exists but has no acting devices.
    #[error("placement group {pgid} has no acting devices")]
    NoDevices {
        /// Placement group in `<pool>.<seed-hex>` form.
        pgid: String,
    },

    /// The cluster client failed for another reason.
    #[error("cluster query failed: {0}")]
    Cluster(String),
}

impl Error {
    /// True when the error belongs to a single request and leaves the
    /// service usable.
    pub fn is_per_request(&self) -> bool {
        matches!(self, Error::NoPoolForPath(_) | Error::Placement(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_converts_into_error() {
        let err: Error = PlacementError::NoSuchPool("data".into()).into();
        assert!(err.is_per_request());
        assert_eq!(err.to_string(), "pool data has no open I/O context");
    }

    #[test]
    fn test_config_is_not_per_request() {
        assert!(!Error::Config("pool map is empty".into()).is_per_request());
        assert!(!Error::ClusterConnect("timeout".into()).is_per_request());
    }
}
