//! Location service.
//!
//! Answers location requests for logical paths. In pool-aware mode a request
//! goes through the routing table to a pool, then through the placement
//! resolver to the devices holding the object. In redirect mode every request
//! gets the same fixed target.

use std::fmt;
use std::sync::Arc;

use corelib::{Error, Location, PrefixRoutingTable, Result, SnapshotStore};
use metrics::counter;
use parking_lot::Mutex;
use placement::{ClusterClient, HostResolver, PlacementResolver};
use refresh::{RefreshConfig, RefresherHandle, TopologyRefresher, TopologySource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::settings::{RedirectTarget, Settings};

/// Opaque suffix attached to every redirect.
pub const REDIRECT_OPAQUE: &str = "radoscms=1";

/// Identity used for requests that carry none.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Request flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocateFlags(u32);

impl LocateFlags {
    pub const NONE: LocateFlags = LocateFlags(0);
    /// Ask for the full location list instead of a redirect.
    pub const LOCATE: LocateFlags = LocateFlags(0x1);

    pub fn contains(self, other: LocateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LocateFlags {
    type Output = LocateFlags;

    fn bitor(self, rhs: LocateFlags) -> LocateFlags {
        LocateFlags(self.0 | rhs.0)
    }
}

/// One location request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocateRequest {
    pub path: String,
    pub flags: LocateFlags,
    /// Client identity as presented by the transport, if any.
    pub identity: Option<String>,
}

impl LocateRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: LocateFlags::NONE,
            identity: None,
        }
    }

    pub fn with_flags(mut self, flags: LocateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn identity(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN_IDENTITY)
    }
}

/// Answer to a location request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateResponse {
    /// Send the client to `host:port`, passing `opaque` along. `host` is
    /// bare: IPv6 literals carry no brackets.
    Redirect {
        host: String,
        port: u16,
        opaque: String,
    },
    /// Every device responsible for the object, primary first.
    Locations(Vec<Location>),
}

impl LocateResponse {
    fn redirect(host: &str, port: u16) -> Self {
        LocateResponse::Redirect {
            host: host.to_string(),
            port,
            opaque: REDIRECT_OPAQUE.to_string(),
        }
    }

    /// Redirect target in `host?opaque` form.
    pub fn target(&self) -> Option<String> {
        match self {
            LocateResponse::Redirect { host, opaque, .. } => Some(format!("{host}?{opaque}")),
            LocateResponse::Locations(_) => None,
        }
    }
}

impl fmt::Display for LocateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateResponse::Redirect { host, port, opaque } => {
                write!(f, "redirect {host}:{port}?{opaque}")
            }
            LocateResponse::Locations(locations) => {
                for (index, location) in locations.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{location}")?;
                }
                Ok(())
            }
        }
    }
}

/// Aggregate capacity, in megabytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpaceReport {
    pub total_mb: u64,
    pub free_mb: u64,
    pub max_free_mb: u64,
}

/// How requests are answered. Fixed for the lifetime of a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceMode {
    Redirect(RedirectTarget),
    PoolAware,
}

/// Routes location requests to pools and devices.
pub struct LocationService {
    mode: ServiceMode,
    routing: PrefixRoutingTable,
    resolver: PlacementResolver,
    store: Arc<SnapshotStore>,
    refresh: RefreshConfig,
    refresher: Mutex<Option<RefresherHandle>>,
}

impl LocationService {
    /// Build the routing table from `settings` and open every bound pool.
    ///
    /// Malformed bindings are logged and skipped. No well-formed binding at
    /// all is a configuration error. Without a root binding the first pool
    /// the cluster lists becomes the default.
    pub async fn configure(
        settings: &Settings,
        client: Arc<dyn ClusterClient>,
        hosts: Arc<dyn HostResolver>,
    ) -> Result<Self> {
        let mut routing = settings.routing_table();
        if routing.is_empty() {
            return Err(Error::Config(
                "your pool map is empty, define 'radoscms.pools'".into(),
            ));
        }

        if !routing.has_root() {
            match client.list_pools().await?.first() {
                Some(pool) => {
                    routing.ensure_root(pool);
                }
                None => warn!("cluster lists no pools, no default for the root prefix"),
            }
        }

        for pool in routing.pools_mut() {
            match client.open_pool(&pool.name).await {
                Ok(id) => {
                    debug!(pool = %pool.name, id = id.0, "opened pool");
                    pool.id = Some(id);
                }
                Err(err) => warn!(pool = %pool.name, error = %err, "cannot open pool"),
            }
        }

        let mode = match &settings.redirect {
            Some(target) => ServiceMode::Redirect(target.clone()),
            None => ServiceMode::PoolAware,
        };
        info!(
            client = client.name(),
            bindings = routing.len(),
            mode = ?mode,
            "location service configured"
        );

        Ok(Self {
            mode,
            routing,
            resolver: PlacementResolver::new(client, hosts).with_port(settings.port),
            store: Arc::new(SnapshotStore::new()),
            refresh: RefreshConfig {
                interval: settings.interval,
                publish: settings.publish,
            },
            refresher: Mutex::new(None),
        })
    }

    pub fn mode(&self) -> &ServiceMode {
        &self.mode
    }

    pub fn routing(&self) -> &PrefixRoutingTable {
        &self.routing
    }

    /// Diagnostic topology cache kept current by the refresher.
    pub fn topology(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Answer one request.
    pub async fn locate(&self, request: &LocateRequest) -> Result<LocateResponse> {
        counter!("cephloc_locate_requests_total").increment(1);
        let result = self.answer(request).await;
        if let Err(err) = &result {
            counter!("cephloc_locate_failures_total").increment(1);
            debug!(path = %request.path, identity = request.identity(), error = %err, "locate failed");
        }
        result
    }

    async fn answer(&self, request: &LocateRequest) -> Result<LocateResponse> {
        let identity = request.identity();

        if let ServiceMode::Redirect(target) = &self.mode {
            debug!(path = %request.path, identity, %target, "redirecting");
            return Ok(LocateResponse::redirect(&target.host, target.port));
        }

        let pool = self
            .routing
            .resolve(&request.path)
            .ok_or_else(|| Error::NoPoolForPath(request.path.clone()))?;
        let mut locations = self.resolver.locate(pool, &request.path).await?;

        if request.flags.contains(LocateFlags::LOCATE) {
            return Ok(LocateResponse::Locations(locations));
        }

        let primary = locations.swap_remove(0);
        let port = primary.port().unwrap_or(self.resolver.port());
        debug!(path = %request.path, identity, pool = %pool, primary = %primary, "redirecting to primary");
        Ok(LocateResponse::redirect(primary.host(), port))
    }

    /// Aggregate free space. Always zero.
    pub fn space(&self, _path: &str) -> SpaceReport {
        SpaceReport::default()
    }

    /// Start the background topology refresher. A second call is a no-op.
    pub fn start_refresher(&self, source: Arc<dyn TopologySource>) {
        let mut slot = self.refresher.lock();
        if slot.is_some() {
            return;
        }
        info!(
            source = %source.describe(),
            interval_secs = self.refresh.interval.as_secs(),
            publish = %self.refresh.publish,
            "starting topology refresher"
        );
        let refresher =
            TopologyRefresher::new(source, self.store.clone()).with_config(self.refresh.clone());
        *slot = Some(refresher.spawn());
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the refresher and wait for it to exit.
    pub async fn shutdown(&self) {
        let handle = self.refresher.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
