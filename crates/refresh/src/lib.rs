//! Topology refresh for the Ceph object locator.
//!
//! This crate keeps the diagnostic topology cache current:
//! - Running the external `osd dump` through a scratch file
//! - Parsing the dump into a fresh snapshot each cycle
//! - Publishing it to the shared snapshot store until cancelled

pub mod error;
pub mod refresher;
pub mod source;

pub use error::{RefreshError, Result};
pub use refresher::{
    CycleReport, PublishMode, RefreshConfig, RefresherHandle, TopologyRefresher, DEFAULT_INTERVAL,
};
pub use source::{CommandSource, TopologySource, DEFAULT_DUMP_FILE};
