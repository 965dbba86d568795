//! Cluster client backed by the `ceph` command line tool.
//!
//! Every query runs `ceph [--conf <file>] --id <user> <args> --format json`
//! and decodes the JSON reply. The monitors compute placement, so the answer
//! is exactly what the cluster itself would use.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use corelib::{Error, PlacementError, PoolId};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ClusterClient, PgId, Placement};

/// Connection parameters, passed through to the `ceph` tool untouched.
#[derive(Clone, Debug)]
pub struct CephCliOptions {
    /// Path or name of the `ceph` executable.
    pub binary: PathBuf,
    /// Cluster configuration file (`--conf`).
    pub conf: Option<PathBuf>,
    /// Client identity (`--id`).
    pub user: String,
}

impl Default for CephCliOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ceph"),
            conf: None,
            user: "admin".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct PoolEntry {
    poolnum: i64,
    poolname: String,
}

#[derive(Deserialize)]
struct OsdMapReply {
    pgid: String,
    acting: Vec<i64>,
}

#[derive(Deserialize)]
struct OsdDumpReply {
    osds: Vec<OsdEntry>,
}

#[derive(Deserialize)]
struct OsdEntry {
    osd: i64,
    #[serde(default)]
    public_addr: String,
}

/// A failed `ceph` invocation.
#[derive(Debug)]
struct CommandFailure {
    status: Option<i32>,
    stderr: String,
}

impl CommandFailure {
    fn is_not_found(&self) -> bool {
        self.status == Some(2)
            || self.stderr.contains("ENOENT")
            || self.stderr.contains("does not exist")
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "ceph exited with {code}: {}", self.stderr.trim()),
            None => write!(f, "ceph was terminated: {}", self.stderr.trim()),
        }
    }
}

/// Cluster client that shells out to `ceph`.
pub struct CephCli {
    options: CephCliOptions,
    /// Pools opened so far, by id.
    pools: RwLock<HashMap<PoolId, String>>,
}

impl CephCli {
    /// Check that the cluster answers and return a client for it.
    pub async fn connect(options: CephCliOptions) -> corelib::Result<Self> {
        let client = Self {
            options,
            pools: RwLock::new(HashMap::new()),
        };
        let fsid: serde_json::Value = client
            .query(&["fsid"])
            .await
            .map_err(|failure| Error::ClusterConnect(failure.to_string()))?;
        info!(fsid = %fsid, user = %client.options.user, "connected to cluster");
        Ok(client)
    }

    pub fn options(&self) -> &CephCliOptions {
        &self.options
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.options.binary);
        if let Some(conf) = &self.options.conf {
            command.arg("--conf").arg(conf);
        }
        command
            .arg("--id")
            .arg(&self.options.user)
            .args(args)
            .args(["--format", "json"]);
        command.kill_on_drop(true);
        command
    }

    async fn query<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, CommandFailure> {
        debug!(?args, "running ceph");
        let output = self.command(args).output().await.map_err(|err| CommandFailure {
            status: None,
            stderr: err.to_string(),
        })?;
        if !output.status.success() {
            return Err(CommandFailure {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|err| CommandFailure {
            status: output.status.code(),
            stderr: format!("unexpected reply to {args:?}: {err}"),
        })
    }

    async fn lspools(&self) -> corelib::Result<Vec<PoolEntry>> {
        self.query(&["osd", "lspools"])
            .await
            .map_err(|failure| Error::ClusterConnect(failure.to_string()))
    }
}

#[async_trait]
impl ClusterClient for CephCli {
    async fn list_pools(&self) -> corelib::Result<Vec<String>> {
        Ok(self.lspools().await?.into_iter().map(|p| p.poolname).collect())
    }

    async fn open_pool(&self, name: &str) -> corelib::Result<PoolId> {
        let entry = self
            .lspools()
            .await?
            .into_iter()
            .find(|p| p.poolname == name)
            .ok_or_else(|| Error::Config(format!("pool {name} does not exist")))?;
        let id = PoolId(entry.poolnum);
        self.pools.write().insert(id, entry.poolname);
        Ok(id)
    }

    async fn object_placement(
        &self,
        pool: PoolId,
        object: &str,
    ) -> Result<Option<Placement>, PlacementError> {
        let Some(name) = self.pools.read().get(&pool).cloned() else {
            return Ok(None);
        };
        let reply: OsdMapReply = match self.query(&["osd", "map", name.as_str(), object]).await {
            Ok(reply) => reply,
            Err(failure) if failure.is_not_found() => return Ok(None),
            Err(failure) => return Err(PlacementError::Cluster(failure.to_string())),
        };
        Ok(Some(Placement {
            pgid: reply.pgid.parse::<PgId>()?,
            acting: reply.acting,
        }))
    }

    async fn device_address(&self, device: i64) -> Result<Option<String>, PlacementError> {
        Ok(self.device_addresses(&[device]).await?.pop().flatten())
    }

    async fn device_addresses(
        &self,
        devices: &[i64],
    ) -> Result<Vec<Option<String>>, PlacementError> {
        let dump: OsdDumpReply = self
            .query(&["osd", "dump"])
            .await
            .map_err(|failure| PlacementError::Cluster(failure.to_string()))?;
        let addresses: HashMap<i64, String> = dump
            .osds
            .into_iter()
            .filter(|osd| !osd.public_addr.is_empty())
            .map(|osd| (osd.osd, osd.public_addr))
            .collect();
        Ok(devices.iter().map(|d| addresses.get(d).cloned()).collect())
    }

    fn name(&self) -> &'static str {
        "CephCli"
    }
}
