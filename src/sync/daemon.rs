// ABOUTME: SyncDaemon - repeats sync passes on the configured interval
// ABOUTME: Passes never overlap; a failed pass waits for the next tick

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use super::orchestrator::{SyncStats, Syncer};
use crate::config::SyncConfig;
use crate::destination::{DestinationReader, DestinationWriter};
use crate::error::{Result, SyncError};

/// Counters reported when the daemon stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonReport {
    pub passes: u64,
    pub failed_passes: u64,
}

/// Runs sync passes against one destination until shut down.
pub struct SyncDaemon<D> {
    config: SyncConfig,
    destination: D,
}

impl<D> SyncDaemon<D>
where
    D: DestinationWriter + DestinationReader,
{
    pub fn new(config: SyncConfig, destination: D) -> Self {
        Self {
            config,
            destination,
        }
    }

    /// Run a single sync pass.
    pub async fn run_sync_cycle(&self) -> Result<SyncStats> {
        Syncer::new(&self.config, &self.destination, &self.destination)
            .sync_from_postgres()
            .await
    }

    /// Run a pass now and then once per interval until `shutdown` fires.
    ///
    /// A pass that overruns the interval delays the next tick instead of
    /// queueing a burst. Pass errors are logged and counted; the next tick
    /// is the retry. A shutdown during a pass drops it, which rolls back the
    /// snapshot and removes its temp files.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<DaemonReport> {
        let period = self.config.sync_interval().ok_or_else(|| {
            SyncError::configuration("A sync interval is required to run continuously")
        })?;

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = DaemonReport::default();

        tracing::info!("Starting SyncDaemon with sync_interval={:?}", period);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping SyncDaemon");
                    break;
                }
                _ = ticker.tick() => {
                    report.passes += 1;
                    tracing::info!("Starting sync pass {}", report.passes);

                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown signal received during sync pass, aborting");
                            report.failed_passes += 1;
                            break;
                        }
                        result = self.run_sync_cycle() => match result {
                            Ok(stats) => log_stats(report.passes, &stats),
                            Err(e) => {
                                report.failed_passes += 1;
                                tracing::error!("Sync pass {} failed: {:?}", report.passes, e);
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(
            "SyncDaemon stopped after {} pass(es), {} failed",
            report.passes,
            report.failed_passes
        );

        Ok(report)
    }
}

pub(crate) fn log_stats(pass: u64, stats: &SyncStats) {
    tracing::info!(
        "Sync pass {} completed: {} tables, {} rows, {} schemas and {} tables deleted in {}ms",
        pass,
        stats.tables_synced,
        stats.rows_synced,
        stats.schemas_deleted,
        stats.tables_deleted,
        stats.duration_ms
    );
}
