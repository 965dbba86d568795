//! Where topology dumps come from.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{RefreshError, Result};

/// Default scratch file for `ceph osd dump` output.
pub const DEFAULT_DUMP_FILE: &str = "/var/tmp/xrootd-rados-cms.osd.dump";

/// Produces line-oriented topology dumps.
#[async_trait]
pub trait TopologySource: Send + Sync + 'static {
    /// Run one dump and return its full text.
    async fn dump(&self) -> Result<String>;

    /// Source name (for logging/debugging).
    fn describe(&self) -> String;
}

/// Runs an external command with stdout redirected to a scratch file, then
/// reads the file back.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: PathBuf,
    args: Vec<String>,
    scratch: PathBuf,
}

impl CommandSource {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch: scratch.into(),
        }
    }

    /// `ceph [--conf <conf>] --id <user> osd dump`.
    pub fn ceph(
        binary: impl Into<PathBuf>,
        conf: Option<&Path>,
        user: &str,
        scratch: impl Into<PathBuf>,
    ) -> Self {
        let mut args = Vec::new();
        if let Some(conf) = conf {
            args.push("--conf".to_string());
            args.push(conf.display().to_string());
        }
        args.extend(["--id", user, "osd", "dump"].map(String::from));
        Self::new(binary, args, scratch)
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    fn scratch_error(&self, source: std::io::Error) -> RefreshError {
        RefreshError::Scratch {
            path: self.scratch.clone(),
            source,
        }
    }
}

#[async_trait]
impl TopologySource for CommandSource {
    async fn dump(&self) -> Result<String> {
        let stdout = tokio::fs::File::create(&self.scratch)
            .await
            .map_err(|err| self.scratch_error(err))?
            .into_std()
            .await;

        debug!(command = %self.describe(), scratch = %self.scratch.display(), "dumping topology");
        // `output()` would re-pipe stdout, so spawn and wait instead.
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RefreshError::Spawn {
                command: self.describe(),
                source,
            })?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RefreshError::Spawn {
                command: self.describe(),
                source,
            })?;

        if !output.status.success() {
            return Err(RefreshError::CommandFailed {
                command: self.describe(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tokio::fs::read_to_string(&self.scratch)
            .await
            .map_err(|err| self.scratch_error(err))
    }

    fn describe(&self) -> String {
        let mut command = self.program.display().to_string();
        for arg in &self.args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }
}
