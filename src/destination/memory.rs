// ABOUTME: In-memory destination used by tests and dry runs
// ABOUTME: Records written rows, batch sizes and deletions for inspection

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::{DestinationReader, DestinationWriter};
use crate::error::{Result, SyncError};
use crate::source::BatchSource;
use crate::types::{ColumnDescriptor, RowBatch, SchemaTable};

/// A table as the memory destination holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub table: SchemaTable,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: RowBatch,
    /// Size of every batch pulled during the last write, in order
    pub batch_sizes: Vec<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    schemas: BTreeSet<String>,
    tables: BTreeMap<String, StoredTable>,
    deleted_schemas: Vec<String>,
    deleted_tables: Vec<SchemaTable>,
    failing_table: Option<String>,
}

/// Destination that keeps everything in memory.
///
/// Clones share state, so a test can hand one clone to the syncer and inspect
/// another afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `table` was written by an earlier pass.
    pub async fn seed_table(&self, table: SchemaTable) {
        let mut inner = self.inner.lock().await;
        inner.schemas.insert(table.schema.clone());
        inner.tables.insert(
            table.to_string(),
            StoredTable {
                table,
                columns: Vec::new(),
                rows: Vec::new(),
                batch_sizes: Vec::new(),
            },
        );
    }

    /// Pretend an empty schema exists.
    pub async fn seed_schema(&self, schema: impl Into<String>) {
        self.inner.lock().await.schemas.insert(schema.into());
    }

    /// Make every write of `table` fail with a destination error.
    pub async fn fail_writes_for(&self, table: &SchemaTable) {
        self.inner.lock().await.failing_table = Some(table.to_string());
    }

    pub async fn table(&self, table: &SchemaTable) -> Option<StoredTable> {
        self.inner.lock().await.tables.get(&table.to_string()).cloned()
    }

    pub async fn deleted_schemas(&self) -> Vec<String> {
        self.inner.lock().await.deleted_schemas.clone()
    }

    pub async fn deleted_tables(&self) -> Vec<SchemaTable> {
        self.inner.lock().await.deleted_tables.clone()
    }
}

impl DestinationWriter for MemoryDestination {
    async fn write_table(
        &self,
        table: &SchemaTable,
        columns: &[ColumnDescriptor],
        batches: &mut (dyn BatchSource + Send),
    ) -> Result<u64> {
        let key = table.to_string();

        if self.inner.lock().await.failing_table.as_deref() == Some(key.as_str()) {
            return Err(SyncError::destination(
                format!("Failed to write {}", key),
                "write rejected by memory destination",
            ));
        }

        let mut rows = Vec::new();
        let mut batch_sizes = Vec::new();
        loop {
            let batch = batches.next_batch()?;
            if batch.is_empty() {
                break;
            }
            batch_sizes.push(batch.len());
            rows.extend(batch);
        }

        info!("Writing {} row(s) in {} batch(es) to {}", rows.len(), batch_sizes.len(), key);

        let written = rows.len() as u64;
        let mut inner = self.inner.lock().await;
        inner.schemas.insert(table.schema.clone());
        inner.tables.insert(
            key,
            StoredTable {
                table: table.clone(),
                columns: columns.to_vec(),
                rows,
                batch_sizes,
            },
        );

        Ok(written)
    }

    async fn delete_schema(&self, schema: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        info!("Deleting schema {}", schema);

        inner.schemas.remove(schema);
        inner.tables.retain(|_, stored| stored.table.schema != schema);
        inner.deleted_schemas.push(schema.to_string());

        Ok(())
    }

    async fn delete_schema_table(&self, table: &SchemaTable) -> Result<()> {
        let mut inner = self.inner.lock().await;
        info!("Deleting table {}", table);

        inner.tables.remove(&table.to_string());
        inner.deleted_tables.push(table.clone());

        Ok(())
    }
}

impl DestinationReader for MemoryDestination {
    async fn schemas(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().await.schemas.iter().cloned().collect())
    }

    async fn schema_tables(&self) -> Result<Vec<SchemaTable>> {
        Ok(self
            .inner
            .lock()
            .await
            .tables
            .values()
            .map(|stored| stored.table.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BatchPipeline;
    use std::io::Cursor;

    fn pipeline(csv: &str, max_batch_rows: usize) -> BatchPipeline<Cursor<Vec<u8>>> {
        BatchPipeline::new(Cursor::new(csv.as_bytes().to_vec()), max_batch_rows).unwrap()
    }

    #[tokio::test]
    async fn test_write_drains_source_and_records_batches() {
        let destination = MemoryDestination::new();
        let table = SchemaTable::new("public", "users");
        let mut batches = pipeline("id,name\n1,a\n2,b\n3,c\n", 2);

        let written = destination.write_table(&table, &[], &mut batches).await.unwrap();

        assert_eq!(written, 3);
        assert!(batches.is_exhausted());
        let stored = destination.table(&table).await.unwrap();
        assert_eq!(stored.batch_sizes, vec![2, 1]);
        assert_eq!(stored.rows[2][1].as_deref(), Some("c"));
        assert_eq!(destination.schemas().await.unwrap(), vec!["public"]);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_rows() {
        let destination = MemoryDestination::new();
        let table = SchemaTable::new("public", "users");

        destination
            .write_table(&table, &[], &mut pipeline("id\n1\n2\n", 10))
            .await
            .unwrap();
        destination
            .write_table(&table, &[], &mut pipeline("id\n3\n", 10))
            .await
            .unwrap();

        let stored = destination.table(&table).await.unwrap();
        assert_eq!(stored.rows, vec![vec![Some("3".to_string())]]);
    }

    #[tokio::test]
    async fn test_delete_schema_removes_its_tables() {
        let destination = MemoryDestination::new();
        destination.seed_table(SchemaTable::new("archived", "old")).await;
        destination.seed_table(SchemaTable::new("public", "users")).await;

        destination.delete_schema("archived").await.unwrap();

        assert_eq!(destination.schemas().await.unwrap(), vec!["public"]);
        assert_eq!(
            destination.schema_tables().await.unwrap(),
            vec![SchemaTable::new("public", "users")]
        );
        assert_eq!(destination.deleted_schemas().await, vec!["archived"]);
    }

    #[tokio::test]
    async fn test_failing_table_is_rejected() {
        let destination = MemoryDestination::new();
        let table = SchemaTable::new("public", "broken");
        destination.fail_writes_for(&table).await;

        let err = destination
            .write_table(&table, &[], &mut pipeline("id\n1\n", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Destination { .. }));
        assert!(destination.table(&table).await.is_none());
    }
}
