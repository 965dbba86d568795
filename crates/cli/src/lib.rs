//! Location service and command line front end for the Ceph object locator.
//!
//! Provides:
//! - The `radoscms.*` settings file loader
//! - The location service answering redirect and list requests
//! - A process-wide service instance
//! - The `cephloc` subcommands

pub mod commands;
pub mod config;
pub mod instance;
pub mod service;
pub mod settings;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
pub use service::{
    LocateFlags, LocateRequest, LocateResponse, LocationService, ServiceMode, SpaceReport,
};
pub use settings::{RedirectTarget, Settings};
