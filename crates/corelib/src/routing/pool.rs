//! Storage pool handles.

use std::fmt;

/// Cluster-assigned pool identifier.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PoolId(pub i64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named pool and, once opened, the cluster id used for placement queries.
///
/// A pool that failed to open keeps `id == None`; placement against it fails
/// with `PlacementError::NoSuchPool`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub id: Option<PoolId>,
}

impl Pool {
    /// A pool known by name only.
    pub fn unopened(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn opened(name: impl Into<String>, id: PoolId) -> Self {
        Self {
            name: name.into(),
            id: Some(id),
        }
    }

    pub fn is_open(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} (id {})", self.name, id),
            None => write!(f, "{} (not open)", self.name),
        }
    }
}
