//! Address to hostname resolution for located devices.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use corelib::Error;
use tokio::net::lookup_host;
use tracing::debug;
use trust_dns_resolver::TokioAsyncResolver;

/// Forward and reverse name lookups.
#[async_trait]
pub trait HostResolver: Send + Sync + 'static {
    /// Hostname for an address, without a trailing dot. `None` when the
    /// address has no usable reverse record.
    async fn reverse(&self, ip: IpAddr) -> Option<String>;

    /// First address a hostname resolves to.
    async fn forward(&self, host: &str) -> Option<IpAddr> {
        lookup_host((host, 0))
            .await
            .ok()?
            .next()
            .map(|addr| addr.ip())
    }
}

/// Resolver using the system DNS configuration.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn from_system_conf() -> corelib::Result<Self> {
        let inner = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|err| Error::Config(format!("failed to init resolver: {err}")))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn reverse(&self, ip: IpAddr) -> Option<String> {
        match self.inner.reverse_lookup(ip).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string()),
            Err(err) => {
                debug!(%ip, error = %err, "reverse lookup failed");
                None
            }
        }
    }
}

/// Fixed host table. An empty table resolves nothing, so every location
/// reports its IP as hostname.
#[derive(Debug, Clone, Default)]
pub struct StaticHosts {
    names: HashMap<IpAddr, String>,
}

impl StaticHosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, ip: IpAddr, name: impl Into<String>) -> Self {
        self.names.insert(ip, name.into());
        self
    }
}

#[async_trait]
impl HostResolver for StaticHosts {
    async fn reverse(&self, ip: IpAddr) -> Option<String> {
        self.names.get(&ip).cloned()
    }

    async fn forward(&self, host: &str) -> Option<IpAddr> {
        self.names
            .iter()
            .find(|(_, name)| name.as_str() == host)
            .map(|(ip, _)| *ip)
    }
}
