// ABOUTME: Library module for pg-mirror
// ABOUTME: Exports the snapshot source, sync orchestration and destinations

pub mod config;
pub mod destination;
pub mod error;
pub mod filters;
pub mod postgres;
pub mod source;
pub mod sync;
pub mod types;
pub mod utils;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use types::{ColumnDescriptor, RowBatch, SchemaTable};
