//! Command line configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Command;
use crate::settings::Settings;

/// Default settings file location.
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/xrootd/cephloc.cfg";

/// Locate objects in a Ceph cluster by logical path
#[derive(Parser, Debug)]
#[command(name = "cephloc", author, version, long_about = None)]
pub struct CliConfig {
    /// Settings file with radoscms.* directives
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    pub config: PathBuf,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "refresh=trace")
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Path to the ceph executable
    #[arg(long, default_value = "ceph")]
    pub ceph: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn settings(&self) -> corelib::Result<Settings> {
        Settings::load(&self.config)
    }

    /// Load the settings, run the selected command and print its result.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        let result = self.command.execute(&settings, &self.ceph).await?;
        println!("{result}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locate() {
        let config =
            CliConfig::try_parse_from(["cephloc", "-c", "/tmp/x.cfg", "locate", "/data/f", "--list"])
                .unwrap();
        assert_eq!(config.config, PathBuf::from("/tmp/x.cfg"));
        match config.command {
            Command::Locate { path, list, identity } => {
                assert_eq!(path, "/data/f");
                assert!(list);
                assert!(identity.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::try_parse_from(["cephloc", "topology"]).unwrap();
        assert_eq!(config.config, PathBuf::from(DEFAULT_SETTINGS_FILE));
        assert_eq!(config.ceph, PathBuf::from("ceph"));
        assert!(config.log_level.is_none());
        assert!(matches!(config.command, Command::Topology { json: false }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliConfig::try_parse_from(["cephloc"]).is_err());
    }
}
