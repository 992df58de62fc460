// ABOUTME: Snapshot session - one connection with one consistent transaction
// ABOUTME: Every catalog read and table export of a pass runs inside it

use std::path::Path;
use tokio_postgres::{Client, IsolationLevel, Transaction};

use super::catalog::CatalogReader;
use super::export::TableExporter;
use crate::error::{Result, SyncError};
use crate::utils::strip_password_from_url;

/// Owns the single source connection of a sync pass.
///
/// Dropping the session closes the connection. A second pass must open its
/// own session.
pub struct SnapshotSession {
    client: Client,
}

impl SnapshotSession {
    /// Connect to the source database.
    pub async fn open(database_url: &str) -> Result<Self> {
        tracing::debug!(
            "Opening snapshot session on {}",
            strip_password_from_url(database_url)
        );
        let client = crate::postgres::connect(database_url).await?;
        Ok(Self { client })
    }

    /// Begin the point-in-time snapshot.
    ///
    /// Uses `SERIALIZABLE, READ ONLY, DEFERRABLE`, which may wait until a
    /// safe snapshot is available but then never fails with a serialization
    /// error. There is no fallback isolation level.
    pub async fn begin(&mut self) -> Result<Snapshot<'_>> {
        let tx = self
            .client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .read_only(true)
            .deferrable(true)
            .start()
            .await
            .map_err(|e| SyncError::connection("Failed to begin snapshot transaction", e))?;

        tracing::debug!("Snapshot transaction started");

        Ok(Snapshot { tx })
    }
}

/// An open snapshot transaction.
///
/// Rolled back when dropped, so an aborted pass releases it on every path.
pub struct Snapshot<'a> {
    tx: Transaction<'a>,
}

impl<'a> Snapshot<'a> {
    /// Catalog queries bound to this snapshot.
    pub fn catalog(&self) -> CatalogReader<'_> {
        CatalogReader::new(&self.tx)
    }

    /// Table exports bound to this snapshot, writing temp files into `temp_dir`.
    pub fn exporter<'b>(&'b self, temp_dir: &'b Path) -> TableExporter<'b> {
        TableExporter::new(&self.tx, temp_dir)
    }

    /// End the snapshot. Nothing was written, so this is a rollback.
    pub async fn finish(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| SyncError::connection("Failed to close snapshot transaction", e))
    }
}
