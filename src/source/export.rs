// ABOUTME: Bulk export of one table into a scoped temp file via COPY TO STDOUT
// ABOUTME: The temp file and the per-pass temp directory are removed on drop

use futures::StreamExt;
use std::io::Seek;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_postgres::Transaction;

use super::batch::BatchPipeline;
use crate::error::{Result, SyncError};
use crate::types::SchemaTable;
use crate::utils::{
    create_managed_temp_dir, quote_literal, remove_managed_temp_dir, sanitize_file_component,
};

/// Prefix of the marker COPY writes in place of SQL NULL.
///
/// Every export appends a random suffix, so a text value can only be read
/// back as NULL if it equals that export's full marker.
pub const PG_NULL_STRING: &str = "PG_MIRROR_NULL";

/// Fresh NULL marker for one export.
pub fn null_marker() -> String {
    format!("{}_{:016x}", PG_NULL_STRING, rand::random::<u64>())
}

/// Temp directory holding a pass's export files.
///
/// Created with [`ExportDir::create`] and removed with everything in it when
/// dropped.
#[derive(Debug)]
pub struct ExportDir {
    path: PathBuf,
}

impl ExportDir {
    pub fn create() -> Result<Self> {
        Ok(Self {
            path: create_managed_temp_dir()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExportDir {
    fn drop(&mut self) {
        if let Err(e) = remove_managed_temp_dir(&self.path) {
            tracing::warn!("Failed to clean up export directory: {}", e);
        }
    }
}

/// Streams tables out of the snapshot with the server's COPY path.
pub struct TableExporter<'a> {
    client: &'a Transaction<'a>,
    temp_dir: &'a Path,
}

impl<'a> TableExporter<'a> {
    pub fn new(client: &'a Transaction<'a>, temp_dir: &'a Path) -> Self {
        Self { client, temp_dir }
    }

    /// Export the full row set of `table` as CSV with a header row.
    ///
    /// On error the partially written temp file is deleted before the error
    /// is returned.
    pub async fn export(&self, table: &SchemaTable) -> Result<ExportedTable> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize_file_component(&table.to_string())))
            .suffix(".csv")
            .tempfile_in(self.temp_dir)
            .map_err(|e| {
                SyncError::export(format!("Failed to create temp file for {}", table), e)
            })?;

        let null_marker = null_marker();
        let sink = file
            .as_file()
            .try_clone()
            .map_err(|e| SyncError::export(format!("Failed to open export of {}", table), e))?;
        let bytes_copied = self
            .copy_into(table, &null_marker, tokio::fs::File::from_std(sink))
            .await?;

        tracing::debug!(
            "Copied {} byte(s) of {} into {}",
            bytes_copied,
            table,
            file.path().display()
        );

        file.rewind()
            .map_err(|e| SyncError::export(format!("Failed to rewind export of {}", table), e))?;

        Ok(ExportedTable {
            file,
            null_marker,
            bytes_copied,
        })
    }

    async fn copy_into(
        &self,
        table: &SchemaTable,
        null_marker: &str,
        file: tokio::fs::File,
    ) -> Result<u64> {
        let query = copy_statement(table, null_marker);
        let io_error = |e: std::io::Error| {
            SyncError::export(format!("Failed to write export of {}", table), e)
        };

        let stream = self
            .client
            .copy_out(query.as_str())
            .await
            .map_err(|e| SyncError::export(format!("Failed to start COPY of {}", table), e))?;
        futures::pin_mut!(stream);

        let mut writer = BufWriter::new(file);
        let mut bytes_copied = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SyncError::export(format!("COPY of {} failed", table), e))?;
            writer.write_all(&chunk).await.map_err(io_error)?;
            bytes_copied += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_error)?;

        Ok(bytes_copied)
    }
}

/// `COPY ... TO STDOUT` for one table, header first, NULL as `null_marker`.
pub fn copy_statement(table: &SchemaTable, null_marker: &str) -> String {
    format!(
        "COPY {} TO STDOUT WITH (FORMAT csv, HEADER true, NULL {})",
        table.quoted(),
        quote_literal(null_marker)
    )
}

/// A finished export waiting to be read back.
///
/// Owns the temp file; it is deleted when this value, or the pipeline built
/// from it, is dropped.
#[derive(Debug)]
pub struct ExportedTable {
    file: NamedTempFile,
    null_marker: String,
    bytes_copied: u64,
}

impl ExportedTable {
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied
    }

    /// Turn the export into a batch pipeline. Reads the header row.
    pub fn into_pipeline(self, max_batch_rows: usize) -> Result<BatchPipeline<NamedTempFile>> {
        Ok(BatchPipeline::new(self.file, max_batch_rows)?.with_null_marker(self.null_marker))
    }
}
