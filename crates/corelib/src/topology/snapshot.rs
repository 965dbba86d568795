//! Snapshot type and the swap-publish store.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use crate::device::{DeviceId, TopologyRecord};

/// Point-in-time mapping from device id to record.
///
/// `generation` is assigned by the store on publish; a snapshot that was
/// never published has generation 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TopologySnapshot {
    generation: u64,
    #[serde(serialize_with = "records_as_list")]
    records: BTreeMap<DeviceId, TopologyRecord>,
}

fn records_as_list<S>(
    records: &BTreeMap<DeviceId, TopologyRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(records.values())
}

impl TopologySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier record with the same id.
    pub fn insert(&mut self, record: TopologyRecord) -> Option<TopologyRecord> {
        self.records.insert(record.id, record)
    }

    pub fn get(&self, id: DeviceId) -> Option<&TopologyRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending id order.
    pub fn records(&self) -> impl Iterator<Item = &TopologyRecord> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.records.keys().copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of devices reported `up`.
    pub fn up_count(&self) -> usize {
        self.records.values().filter(|r| r.is_up()).count()
    }

    /// Number of devices reported `in`.
    pub fn in_count(&self) -> usize {
        self.records.values().filter(|r| r.is_in()).count()
    }
}

impl FromIterator<TopologyRecord> for TopologySnapshot {
    fn from_iter<I: IntoIterator<Item = TopologyRecord>>(iter: I) -> Self {
        let mut snapshot = TopologySnapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

/// Holds the currently published snapshot.
///
/// One writer (the refresher), any number of readers. The lock is only held
/// for the pointer swap or the `Arc` clone, never while building a snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible snapshot. Returns the generation assigned to it.
    pub fn publish(&self, mut snapshot: TopologySnapshot) -> u64 {
        let (generation, previous) = {
            let mut current = self.current.write();
            snapshot.generation = current.generation + 1;
            let generation = snapshot.generation;
            (generation, std::mem::replace(&mut *current, Arc::new(snapshot)))
        };
        // The old snapshot is dropped outside the lock.
        drop(previous);
        tracing::trace!(generation, "published topology snapshot");
        generation
    }

    /// The snapshot visible at call time.
    pub fn get(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Shortcut for a single-device lookup against the current snapshot.
    pub fn record(&self, id: DeviceId) -> Option<TopologyRecord> {
        self.get().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> TopologyRecord {
        TopologyRecord::new(DeviceId(id), "up", "in").with_weight(1.0)
    }

    #[test]
    fn test_get_before_publish_is_empty() {
        let store = SnapshotStore::new();
        let snapshot = store.get();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generation(), 0);
    }

    #[test]
    fn test_publish_replaces_whole_mapping() {
        let store = SnapshotStore::new();
        store.publish([record(1), record(2)].into_iter().collect());
        let old = store.get();

        store.publish([record(3)].into_iter().collect());
        let new = store.get();

        assert_eq!(new.ids().collect::<Vec<_>>(), vec![DeviceId(3)]);
        assert_eq!(new.generation(), 2);
        // A reader holding the old view keeps it intact.
        assert_eq!(old.len(), 2);
        assert_eq!(old.generation(), 1);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut snapshot = TopologySnapshot::new();
        snapshot.insert(record(4));
        let replaced = snapshot.insert(TopologyRecord::new(DeviceId(4), "down", "out"));
        assert!(replaced.is_some());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.up_count(), 0);
        assert_eq!(snapshot.in_count(), 0);
    }

    #[test]
    fn test_record_lookup() {
        let store = SnapshotStore::new();
        store.publish([record(9)].into_iter().collect());
        assert_eq!(store.record(DeviceId(9)).map(|r| r.weight), Some(1.0));
        assert!(store.record(DeviceId(10)).is_none());
    }
}
