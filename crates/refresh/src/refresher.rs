//! Background topology refresh.
//!
//! # Cycle
//!
//! 1. Stop if cancelled (the only cancellation point before a dump)
//! 2. Run one dump through the [`TopologySource`]
//! 3. Parse it into a fresh scratch snapshot
//! 4. Publish, once per pass or after every parsed line
//! 5. Wait for the next tick or for cancellation
//!
//! A failed cycle is logged and the last published snapshot stays visible.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use corelib::topology::parse_line;
use corelib::{Error, SnapshotStore, TopologySnapshot};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{RefreshError, Result};
use crate::source::TopologySource;

/// Default time between two refresh cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// When the scratch snapshot becomes visible to readers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishMode {
    /// Publish once, after the whole dump parsed.
    #[default]
    EndOfCycle,
    /// Publish the accumulated snapshot after every parsed line.
    PerLine,
}

impl FromStr for PublishMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "end-of-cycle" => Ok(PublishMode::EndOfCycle),
            "per-line" => Ok(PublishMode::PerLine),
            other => Err(Error::Config(format!("unknown publish mode '{other}'"))),
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishMode::EndOfCycle => write!(f, "end-of-cycle"),
            PublishMode::PerLine => write!(f, "per-line"),
        }
    }
}

/// Refresher configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshConfig {
    pub interval: Duration,
    pub publish: PublishMode,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            publish: PublishMode::default(),
        }
    }
}

/// Outcome of one successful cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Device lines turned into records.
    pub parsed: usize,
    /// Non-blank lines that were not device lines.
    pub skipped: usize,
    /// Number of snapshots published during the cycle.
    pub published: usize,
    /// Generation of the last snapshot published.
    pub generation: Option<u64>,
}

/// Periodically rebuilds the topology snapshot from a dump source.
pub struct TopologyRefresher {
    source: Arc<dyn TopologySource>,
    store: Arc<SnapshotStore>,
    config: RefreshConfig,
}

impl TopologyRefresher {
    pub fn new(source: Arc<dyn TopologySource>, store: Arc<SnapshotStore>) -> Self {
        Self {
            source,
            store,
            config: RefreshConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RefreshConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Run a single dump-parse-publish pass.
    pub async fn refresh_once(&self) -> Result<CycleReport> {
        counter!("cephloc_refresh_cycles_total").increment(1);
        info!(source = %self.source.describe(), "refreshing the OSD map");

        let result = self.cycle().await;
        if result.is_err() {
            counter!("cephloc_refresh_failures_total").increment(1);
        }
        result
    }

    async fn cycle(&self) -> Result<CycleReport> {
        let text = self.source.dump().await?;

        let mut scratch = TopologySnapshot::new();
        let mut report = CycleReport::default();
        for line in text.lines() {
            let Some(record) = parse_line(line) else {
                if !line.trim().is_empty() {
                    trace!(line, "skipping non-device line");
                    report.skipped += 1;
                }
                continue;
            };

            debug!("{record}");
            scratch.insert(record);
            report.parsed += 1;

            if self.config.publish == PublishMode::PerLine {
                report.generation = Some(self.store.publish(scratch.clone()));
                report.published += 1;
            }
        }

        if report.parsed == 0 {
            return Err(RefreshError::EmptyDump);
        }

        let devices = scratch.len();
        if self.config.publish == PublishMode::EndOfCycle {
            report.generation = Some(self.store.publish(scratch));
            report.published += 1;
        }
        gauge!("cephloc_topology_devices").set(devices as f64);

        debug!(
            devices,
            skipped = report.skipped,
            generation = report.generation,
            "refresh cycle complete"
        );
        Ok(report)
    }

    /// Refresh until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(err) = self.refresh_once().await {
                warn!(error = %err, "topology refresh failed, keeping last snapshot");
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }
        info!("topology refresher stopped");
    }

    /// Start the refresh loop on the current runtime.
    pub fn spawn(self) -> RefresherHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        RefresherHandle { cancel, task }
    }
}

/// Owner of a running refresher task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct RefresherHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Ask the loop to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "topology refresher task did not exit cleanly");
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corelib::DeviceId;

    struct FixedSource(&'static str);

    #[async_trait]
    impl TopologySource for FixedSource {
        async fn dump(&self) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    const DUMP: &str = "epoch 12\n\
        osd.0 up in weight 1 10.0.0.1:6800/1\n\
        osd.x up in weight 1 10.0.0.9:6800/1\n\
        \n\
        osd.1 down out weight 0 10.0.0.2:6800/1\n";

    fn refresher(text: &'static str, publish: PublishMode) -> TopologyRefresher {
        TopologyRefresher::new(Arc::new(FixedSource(text)), Arc::new(SnapshotStore::new()))
            .with_config(RefreshConfig {
                publish,
                ..RefreshConfig::default()
            })
    }

    #[test]
    fn test_publish_mode_from_str() {
        assert_eq!("per-line".parse::<PublishMode>().unwrap(), PublishMode::PerLine);
        assert_eq!(
            "end-of-cycle".parse::<PublishMode>().unwrap(),
            PublishMode::EndOfCycle
        );
        assert!("sometimes".parse::<PublishMode>().is_err());
    }

    #[tokio::test]
    async fn test_end_of_cycle_publishes_once() {
        let refresher = refresher(DUMP, PublishMode::EndOfCycle);
        let report = refresher.refresh_once().await.unwrap();

        assert_eq!(report.parsed, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.published, 1);
        assert_eq!(report.generation, Some(1));

        let snapshot = refresher.store().get();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.get(DeviceId(1)).unwrap().is_up());
    }

    #[tokio::test]
    async fn test_per_line_publishes_each_record() {
        let refresher = refresher(DUMP, PublishMode::PerLine);
        let report = refresher.refresh_once().await.unwrap();

        assert_eq!(report.published, 2);
        assert_eq!(report.generation, Some(2));
        assert_eq!(refresher.store().get().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_dump_keeps_previous_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        store.publish(
            [corelib::TopologyRecord::new(DeviceId(7), "up", "in")]
                .into_iter()
                .collect(),
        );

        let refresher = TopologyRefresher::new(Arc::new(FixedSource("epoch 3\n")), store.clone());
        assert!(matches!(
            refresher.refresh_once().await,
            Err(RefreshError::EmptyDump)
        ));
        assert_eq!(store.get().generation(), 1);
        assert!(store.record(DeviceId(7)).is_some());
    }
}
