//! Parser for line-oriented topology dumps (`ceph osd dump` text output).
//!
//! A relevant line starts with a device token `<label>.<id>`:
//!
//! ```text
//! osd.3 up   in  weight 0.75 up_from 9 up_thru 12 down_at 0 last_clean_interval [0,0) 10.0.0.5:6800/123 ...
//! ```
//!
//! Any line whose first token has no numeric `<id>` is skipped, which also
//! covers the header lines (`epoch`, `pool`, `max_osd`, ...) of a full dump.

use crate::device::{host_part, DeviceId, TopologyRecord};
use crate::topology::snapshot::TopologySnapshot;

const WEIGHT_TAG: &str = "weight";

/// Parse a single dump line. Returns `None` for lines that do not describe a
/// device.
pub fn parse_line(line: &str) -> Option<TopologyRecord> {
    let mut tokens = line.split_whitespace();
    let device = tokens.next()?;

    let id = match device.rsplit_once('.') {
        Some((label, id)) if !label.is_empty() => id.parse::<u64>().ok()?,
        _ => return None,
    };

    let active = tokens.next().unwrap_or_default();
    let state = tokens.next().unwrap_or_default();
    let mut record = TopologyRecord::new(DeviceId(id), active, state);

    let mut weight_seen = false;
    while let Some(token) = tokens.next() {
        if token == WEIGHT_TAG && !weight_seen {
            weight_seen = true;
            record.weight = tokens.next().map(parse_weight).unwrap_or(0.0);
            continue;
        }
        if token.contains(':') {
            record.address = host_part(token).to_string();
            break;
        }
    }

    Some(record)
}

fn parse_weight(token: &str) -> f64 {
    match token.parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight >= 0.0 => weight,
        _ => 0.0,
    }
}

/// Parse a whole dump into a snapshot. Later lines for the same device
/// replace earlier ones.
pub fn parse_dump(text: &str) -> TopologySnapshot {
    text.lines().filter_map(parse_line).collect()
}
