//! Process-wide service instance.
//!
//! The hosting process configures one `LocationService` at startup and
//! installs it here so request handlers can reach it without threading it
//! through every call.

use std::sync::{Arc, OnceLock};

use crate::service::LocationService;

static INSTANCE: OnceLock<Arc<LocationService>> = OnceLock::new();

/// Install the service. Returns the rejected service if one is already
/// installed.
pub fn install(service: Arc<LocationService>) -> Result<(), Arc<LocationService>> {
    INSTANCE.set(service)
}

/// The installed service, if any.
pub fn get() -> Option<Arc<LocationService>> {
    INSTANCE.get().cloned()
}
