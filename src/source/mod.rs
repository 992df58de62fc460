// ABOUTME: Source-side components of a sync pass
// ABOUTME: Snapshot session, catalog enumeration, table export and batch pipeline

pub mod batch;
pub mod catalog;
pub mod export;
pub mod session;

pub use batch::{BatchPipeline, BatchSource};
pub use catalog::CatalogReader;
pub use export::{ExportDir, ExportedTable, TableExporter, PG_NULL_STRING};
pub use session::{Snapshot, SnapshotSession};
