// ABOUTME: Post-pass reconciliation of the destination against the synced set
// ABOUTME: Deletes destination schemas and tables that no longer exist upstream

use std::collections::HashSet;

use crate::destination::{DestinationReader, DestinationWriter};
use crate::error::Result;
use crate::types::SchemaTable;

/// What a reconciliation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub deleted_schemas: Vec<String>,
    pub deleted_tables: Vec<SchemaTable>,
}

/// Prunes destination objects that have no counterpart in the pass.
///
/// Must run after every table of the pass was written, since anything it
/// does not find in the synced set is deleted.
pub struct Reconciler<'a, W, R> {
    writer: &'a W,
    reader: &'a R,
}

impl<'a, W, R> Reconciler<'a, W, R>
where
    W: DestinationWriter,
    R: DestinationReader,
{
    pub fn new(writer: &'a W, reader: &'a R) -> Self {
        Self { writer, reader }
    }

    /// Delete destination schemas and tables missing from `synced`.
    ///
    /// `synced` holds destination names, so the schema prefix must already be
    /// applied. Matching is exact on the schema name and on `schema.table`.
    /// The first reader or writer error aborts the reconciliation.
    pub async fn reconcile(&self, synced: &[SchemaTable]) -> Result<ReconcileResult> {
        let source_schemas: HashSet<&str> = synced.iter().map(|t| t.schema.as_str()).collect();
        let source_tables: HashSet<String> = synced.iter().map(ToString::to_string).collect();

        let mut result = ReconcileResult::default();

        for schema in self.reader.schemas().await? {
            if !source_schemas.contains(schema.as_str()) {
                tracing::info!("Deleting schema {} (no longer in source)", schema);
                self.writer.delete_schema(&schema).await?;
                result.deleted_schemas.push(schema);
            }
        }

        for table in self.reader.schema_tables().await? {
            if !source_tables.contains(&table.to_string()) {
                tracing::info!("Deleting table {} (no longer in source)", table);
                self.writer.delete_schema_table(&table).await?;
                result.deleted_tables.push(table);
            }
        }

        if result.deleted_schemas.is_empty() && result.deleted_tables.is_empty() {
            tracing::debug!("Destination already matches source, nothing to delete");
        }

        Ok(result)
    }
}
