//! The prefix routing table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::routing::pool::Pool;

/// Catch-all prefix every configured table ends up with.
pub const ROOT_PREFIX: &str = "/";

/// How overlapping prefixes are ranked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The longest registered prefix of the path wins.
    #[default]
    LongestPrefix,
    /// Prefixes are tried from the lexicographically greatest downward and
    /// the first literal prefix of the path wins. Two prefixes of the same
    /// path are themselves prefix-ordered, so this picks the same binding as
    /// `LongestPrefix`.
    Lexicographic,
}

impl FromStr for MatchPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "longest" => Ok(MatchPolicy::LongestPrefix),
            "lexicographic" => Ok(MatchPolicy::Lexicographic),
            other => Err(Error::Config(format!("unknown match policy {other:?}"))),
        }
    }
}

/// A `<prefix>:<pool>` binding as written in configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolBinding {
    pub prefix: String,
    pub pool: String,
}

impl PoolBinding {
    /// Split a token at its first colon. The colon must be neither the first
    /// nor the last character.
    pub fn parse(token: &str) -> Result<Self> {
        match token.find(':') {
            Some(pos) if pos > 0 && pos < token.len() - 1 => Ok(Self {
                prefix: token[..pos].to_string(),
                pool: token[pos + 1..].to_string(),
            }),
            _ => Err(Error::Config(format!(
                "pool binding {token:?} is not of the form <prefix>:<pool>"
            ))),
        }
    }
}

impl fmt::Display for PoolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.pool)
    }
}

/// Prefix to pool bindings.
///
/// Filled during configuration, then shared read-only.
#[derive(Clone, Debug, Default)]
pub struct PrefixRoutingTable {
    bindings: BTreeMap<String, Pool>,
    policy: MatchPolicy,
}

impl PrefixRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        Self {
            bindings: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Register a binding from a `<prefix>:<pool>` configuration token.
    ///
    /// A malformed token is logged and leaves the table unchanged.
    pub fn add_binding(&mut self, token: &str) -> Result<()> {
        let binding = match PoolBinding::parse(token) {
            Ok(binding) => binding,
            Err(err) => {
                warn!(token, "error splitting the pool binding");
                return Err(err);
            }
        };
        info!(prefix = %binding.prefix, pool = %binding.pool, "found pool for prefix");
        self.bind(binding.prefix, Pool::unopened(binding.pool))?;
        Ok(())
    }

    /// Bind `prefix` to `pool`, returning the pool it replaces.
    pub fn bind(&mut self, prefix: impl Into<String>, pool: Pool) -> Result<Option<Pool>> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(Error::Config("pool prefix must not be empty".into()));
        }
        let previous = self.bindings.insert(prefix.clone(), pool);
        if let Some(previous) = &previous {
            warn!(prefix = %prefix, replaced = %previous.name, "prefix bound twice, last binding wins");
        }
        Ok(previous)
    }

    /// Pool bound to the most specific prefix of `path`.
    pub fn resolve(&self, path: &str) -> Option<&Pool> {
        self.resolve_binding(path).map(|(_, pool)| pool)
    }

    /// Like `resolve`, also returning the matched prefix.
    pub fn resolve_binding(&self, path: &str) -> Option<(&str, &Pool)> {
        let mut matches = self
            .bindings
            .iter()
            .filter(|(prefix, _)| path.as_bytes().starts_with(prefix.as_bytes()));

        let found = match self.policy {
            MatchPolicy::LongestPrefix => matches.max_by_key(|(prefix, _)| prefix.len()),
            MatchPolicy::Lexicographic => matches.next_back(),
        };
        found.map(|(prefix, pool)| (prefix.as_str(), pool))
    }

    pub fn has_root(&self) -> bool {
        self.bindings.contains_key(ROOT_PREFIX)
    }

    /// Bind the root prefix to `pool_name` unless a root binding exists.
    /// Returns true when a binding was added.
    pub fn ensure_root(&mut self, pool_name: &str) -> bool {
        if self.has_root() {
            return false;
        }
        info!(pool = pool_name, "binding root prefix to default pool");
        self.bindings
            .insert(ROOT_PREFIX.to_string(), Pool::unopened(pool_name));
        true
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in ascending prefix order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Pool)> {
        self.bindings.iter().map(|(prefix, pool)| (prefix.as_str(), pool))
    }

    /// Mutable access to the bound pools, used while opening them during
    /// configuration.
    pub fn pools_mut(&mut self) -> impl Iterator<Item = &mut Pool> {
        self.bindings.values_mut()
    }
}
