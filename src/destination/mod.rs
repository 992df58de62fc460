// ABOUTME: Destination writer and reader contracts for the columnar store
// ABOUTME: Includes an in-memory destination and a local directory destination

pub mod local;
pub mod memory;

use std::future::Future;

use crate::error::Result;
use crate::source::BatchSource;
use crate::types::{ColumnDescriptor, SchemaTable};

pub use local::LocalDestination;
pub use memory::MemoryDestination;

/// Receives mirrored tables and removes stale ones.
///
/// The writer drives the batch source: it pulls until an empty batch comes
/// back, so ingestion never runs ahead of what the store can take. Every
/// table write is an independent unit of work; there is no transaction
/// spanning several tables.
pub trait DestinationWriter {
    /// Replace `table` with the rows pulled from `batches`.
    ///
    /// Returns the number of rows written.
    fn write_table(
        &self,
        table: &SchemaTable,
        columns: &[ColumnDescriptor],
        batches: &mut (dyn BatchSource + Send),
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Delete a schema and everything in it.
    fn delete_schema(&self, schema: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete a single table.
    fn delete_schema_table(&self, table: &SchemaTable) -> impl Future<Output = Result<()>> + Send;
}

/// Lists what the destination currently holds.
pub trait DestinationReader {
    fn schemas(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn schema_tables(&self) -> impl Future<Output = Result<Vec<SchemaTable>>> + Send;
}
