// ABOUTME: Sync pass orchestration, reconciliation and the interval daemon
// ABOUTME: Ties the snapshot source to a destination writer and reader

pub mod daemon;
pub mod orchestrator;
pub mod reconciler;

pub use daemon::{DaemonReport, SyncDaemon};
pub use orchestrator::{select_tables, SyncStats, Syncer, TableSyncJob};
pub use reconciler::{ReconcileResult, Reconciler};
