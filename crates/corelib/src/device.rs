//! Storage device (OSD) records as seen in a topology dump.
//!
//! Devices are identified by a compact `DeviceId` that is cheap to compare and
//! hash. A `TopologyRecord` carries the health, weight and address of one
//! device at the moment the dump was taken.

use std::fmt;

use serde::Serialize;

/// Identifier of a storage device, unique within a snapshot.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "osd.{}", self.0)
    }
}

/// One device's identity, state, weight and address.
///
/// `active` and `state` are kept verbatim as emitted by the dump source
/// (`up`/`down`, `in`/`out`); nothing here interprets other tokens.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopologyRecord {
    pub id: DeviceId,
    pub active: String,
    pub state: String,
    /// Capacity weight, 0.0 when absent or unparseable.
    pub weight: f64,
    /// Bare host or IP, empty when the dump line carried no address.
    pub address: String,
}

impl TopologyRecord {
    /// Construct a record with no weight and no address.
    pub fn new(id: DeviceId, active: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id,
            active: active.into(),
            state: state.into(),
            weight: 0.0,
            address: String::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn is_up(&self) -> bool {
        self.active == "up"
    }

    pub fn is_in(&self) -> bool {
        self.state == "in"
    }
}

impl fmt::Display for TopologyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OSD[ {:04} ] active={:<10} state={:<10} weight={:.02} ip=[{}]",
            self.id.0, self.active, self.state, self.weight, self.address
        )
    }
}

/// Reduce a raw cluster address to its host part.
///
/// Handles the plain `10.0.0.5:6800/123` form as well as the address-vector
/// form `[v2:10.0.0.5:6800/123,v1:10.0.0.5:6801/123]`. Bracketed IPv6 hosts
/// (`[::1]:6800/0`) keep everything inside the brackets. A string with no
/// port is returned unchanged.
pub fn host_part(raw: &str) -> &str {
    let mut addr = raw.trim();
    if let Some(vector) = addr.strip_prefix('[') {
        if vector.starts_with("v1:") || vector.starts_with("v2:") || vector.starts_with("any:") {
            addr = vector.split(',').next().unwrap_or(vector);
            addr = addr.trim_end_matches(']');
        }
    }
    for kind in ["v1:", "v2:", "any:"] {
        if let Some(rest) = addr.strip_prefix(kind) {
            addr = rest;
            break;
        }
    }
    if let Some(v6) = addr.strip_prefix('[') {
        return v6.split(']').next().unwrap_or(v6);
    }
    match addr.find(':') {
        Some(pos) => &addr[..pos],
        None => addr.split('/').next().unwrap_or(addr),
    }
}
