//! CLI subcommands.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use corelib::{Error, SnapshotStore, TopologySnapshot};
use placement::{CephCli, CephCliOptions, DnsResolver};
use refresh::{CommandSource, RefreshConfig, TopologyRefresher};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::instance;
use crate::service::{LocateFlags, LocateRequest, LocateResponse, LocationService};
use crate::settings::Settings;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer one location request for PATH
    Locate {
        /// Logical path; also used as the object name
        path: String,

        /// Print every location instead of redirecting to the primary
        #[arg(long)]
        list: bool,

        /// Client identity to log with the request
        #[arg(long)]
        identity: Option<String>,
    },

    /// Show which pool the configured bindings select for PATH
    Route { path: String },

    /// Run one topology dump and print the resulting snapshot
    Topology {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the topology cache refreshed until interrupted
    Watch,
}

/// Output of a finished command.
#[derive(Debug)]
pub enum CommandResult {
    Located(LocateResponse),
    Routed {
        path: String,
        prefix: String,
        pool: String,
    },
    Topology(String),
    Stopped {
        generation: u64,
        devices: usize,
    },
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Located(response) => write!(f, "{response}"),
            CommandResult::Routed { path, prefix, pool } => {
                write!(f, "{path} -> {pool} (prefix {prefix})")
            }
            CommandResult::Topology(rendered) => write!(f, "{rendered}"),
            CommandResult::Stopped {
                generation,
                devices,
            } => write!(
                f,
                "refresher stopped at generation {generation} with {devices} devices"
            ),
        }
    }
}

impl Command {
    pub async fn execute(&self, settings: &Settings, ceph: &Path) -> anyhow::Result<CommandResult> {
        match self {
            Command::Locate {
                path,
                list,
                identity,
            } => {
                let service = install(connect(settings, ceph).await?);
                let mut request = LocateRequest::new(path.as_str());
                if *list {
                    request = request.with_flags(LocateFlags::LOCATE);
                }
                if let Some(identity) = identity {
                    request = request.with_identity(identity.as_str());
                }
                Ok(CommandResult::Located(service.locate(&request).await?))
            }

            Command::Route { path } => route(settings, path),

            Command::Topology { json } => {
                let store = Arc::new(SnapshotStore::new());
                let refresher =
                    TopologyRefresher::new(Arc::new(dump_source(settings, ceph)), store.clone())
                        .with_config(refresh_config(settings));
                refresher.refresh_once().await.map_err(Error::from)?;
                Ok(CommandResult::Topology(render_topology(&store.get(), *json)?))
            }

            Command::Watch => {
                let service = install(connect(settings, ceph).await?);
                service.start_refresher(Arc::new(dump_source(settings, ceph)));
                watch(&service, settings).await;
                service.shutdown().await;

                let snapshot = service.topology().get();
                Ok(CommandResult::Stopped {
                    generation: snapshot.generation(),
                    devices: snapshot.len(),
                })
            }
        }
    }
}

/// Connect to the cluster and configure a location service from `settings`.
pub async fn connect(settings: &Settings, ceph: &Path) -> corelib::Result<LocationService> {
    let client = CephCli::connect(CephCliOptions {
        binary: ceph.to_path_buf(),
        conf: settings.ceph_conf.clone(),
        user: settings.user.clone(),
    })
    .await?;
    let hosts = DnsResolver::from_system_conf()?;
    LocationService::configure(settings, Arc::new(client), Arc::new(hosts)).await
}

fn install(service: LocationService) -> Arc<LocationService> {
    let service = Arc::new(service);
    if instance::install(service.clone()).is_err() {
        warn!("a location service is already installed, keeping the first");
    }
    service
}

fn route(settings: &Settings, path: &str) -> anyhow::Result<CommandResult> {
    let routing = settings.routing_table();
    let (prefix, pool) = routing
        .resolve_binding(path)
        .ok_or_else(|| Error::NoPoolForPath(path.to_string()))?;
    Ok(CommandResult::Routed {
        path: path.to_string(),
        prefix: prefix.to_string(),
        pool: pool.name.clone(),
    })
}

fn dump_source(settings: &Settings, ceph: &Path) -> CommandSource {
    CommandSource::ceph(
        ceph,
        settings.ceph_conf.as_deref(),
        &settings.user,
        &settings.dump_file,
    )
}

fn refresh_config(settings: &Settings) -> RefreshConfig {
    RefreshConfig {
        interval: settings.interval,
        publish: settings.publish,
    }
}

/// Log every new snapshot until Ctrl-C.
async fn watch(service: &LocationService, settings: &Settings) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seen = 0;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(err) = result {
                    warn!(error = %err, "cannot listen for Ctrl-C, stopping");
                }
                break;
            }
            _ = ticker.tick() => {
                let snapshot = service.topology().get();
                if snapshot.generation() != seen {
                    seen = snapshot.generation();
                    info!(
                        generation = seen,
                        devices = snapshot.len(),
                        up_count = snapshot.up_count(),
                        in_count = snapshot.in_count(),
                        "topology snapshot"
                    );
                }
            }
        }
    }
    info!("interrupted, stopping the refresher");
}

/// Text or JSON rendering of a snapshot.
pub fn render_topology(snapshot: &TopologySnapshot, json: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(snapshot);
    }
    let mut out = String::new();
    for record in snapshot.records() {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out.push_str(&format!(
        "generation {}: {} devices, {} up, {} in",
        snapshot.generation(),
        snapshot.len(),
        snapshot.up_count(),
        snapshot.in_count()
    ));
    Ok(out)
}
