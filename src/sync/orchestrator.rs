// ABOUTME: Sequences one sync pass from PostgreSQL into the destination
// ABOUTME: Snapshot, enumerate, filter, export and write each table, then reconcile

use std::time::Instant;

use super::reconciler::Reconciler;
use crate::config::SyncConfig;
use crate::destination::{DestinationReader, DestinationWriter};
use crate::error::Result;
use crate::filters::SyncFilter;
use crate::source::{CatalogReader, ExportDir, SnapshotSession, TableExporter};
use crate::types::SchemaTable;

/// Statistics from one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub tables_synced: usize,
    pub rows_synced: u64,
    pub schemas_deleted: usize,
    pub tables_deleted: usize,
    pub duration_ms: u64,
}

/// One table to mirror: where it is read from and where it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSyncJob {
    pub source: SchemaTable,
    /// Same table with the destination schema prefix applied
    pub destination: SchemaTable,
}

/// Turn enumerated tables into work items, keeping those the filter accepts.
pub fn select_tables(
    filter: &SyncFilter,
    tables: impl IntoIterator<Item = SchemaTable>,
    schema_prefix: &str,
) -> Vec<TableSyncJob> {
    tables
        .into_iter()
        .filter(|table| filter.should_sync_table(table))
        .map(|source| TableSyncJob {
            destination: source.with_schema_prefix(schema_prefix),
            source,
        })
        .collect()
}

/// Runs sync passes against one destination.
pub struct Syncer<'a, W, R> {
    config: &'a SyncConfig,
    writer: &'a W,
    reader: &'a R,
}

impl<'a, W, R> Syncer<'a, W, R>
where
    W: DestinationWriter,
    R: DestinationReader,
{
    pub fn new(config: &'a SyncConfig, writer: &'a W, reader: &'a R) -> Self {
        Self {
            config,
            writer,
            reader,
        }
    }

    /// Mirror every selected table, then prune the destination.
    ///
    /// All reads happen inside one serializable snapshot. Tables are synced
    /// one at a time and the first error aborts the pass; the snapshot, the
    /// connection and any temp files are released on every path.
    /// Reconciliation only runs once every table was written.
    pub async fn sync_from_postgres(&self) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        let filter = SyncFilter::from_spec(self.config.only_tables());
        let export_dir = ExportDir::create()?;

        let mut session = SnapshotSession::open(self.config.database_url()).await?;
        let snapshot = session.begin().await?;

        let jobs = {
            let catalog = snapshot.catalog();
            let jobs = self.plan(&catalog, &filter).await?;

            let exporter = snapshot.exporter(export_dir.path());
            for job in &jobs {
                stats.rows_synced += self.sync_table(&catalog, &exporter, job).await?;
                stats.tables_synced += 1;
            }
            jobs
        };

        snapshot.finish().await?;
        drop(session);

        let synced: Vec<SchemaTable> = jobs.into_iter().map(|job| job.destination).collect();
        if synced.is_empty() {
            tracing::warn!("No tables were synced; every destination object will be deleted");
        }

        let reconciled = Reconciler::new(self.writer, self.reader)
            .reconcile(&synced)
            .await?;
        stats.schemas_deleted = reconciled.deleted_schemas.len();
        stats.tables_deleted = reconciled.deleted_tables.len();

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    async fn plan(
        &self,
        catalog: &CatalogReader<'_>,
        filter: &SyncFilter,
    ) -> Result<Vec<TableSyncJob>> {
        let mut jobs = Vec::new();
        for schema in catalog.list_schemas().await? {
            let tables = catalog.list_tables(&schema).await?;
            jobs.extend(select_tables(filter, tables, self.config.schema_prefix()));
        }

        if filter.is_wildcard() {
            tracing::info!("{} table(s) selected for sync", jobs.len());
        } else {
            for name in filter.unmatched(jobs.iter().map(|job| &job.source)) {
                tracing::warn!("Table '{}' from the allow-list was not found in the source", name);
            }
            tracing::info!("{} allow-listed table(s) selected for sync", jobs.len());
        }
        Ok(jobs)
    }

    async fn sync_table(
        &self,
        catalog: &CatalogReader<'_>,
        exporter: &TableExporter<'_>,
        job: &TableSyncJob,
    ) -> Result<u64> {
        tracing::info!("Syncing {}...", job.source);

        let exported = exporter.export(&job.source).await?;
        let bytes_exported = exported.bytes_copied();
        let mut pipeline = exported.into_pipeline(self.config.max_batch_rows())?;
        let columns = catalog.list_columns(&job.source, pipeline.header()).await?;

        let rows = self
            .writer
            .write_table(&job.destination, &columns, &mut pipeline)
            .await?;

        tracing::info!(
            "Synced {} row(s) of {} into {} ({} batch(es), {} byte(s) exported)",
            rows,
            job.source,
            job.destination,
            pipeline.batches_read(),
            bytes_exported
        );

        Ok(rows)
    }
}
