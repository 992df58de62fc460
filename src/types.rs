// ABOUTME: Shared value types for catalog entries and exported rows
// ABOUTME: SchemaTable, ColumnDescriptor and RowBatch

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::quote_ident;

/// One field of an exported row. `None` is SQL NULL, distinct from `Some("")`.
pub type FieldValue = Option<String>;

/// An ordered group of exported rows, bounded by the configured batch size.
pub type RowBatch = Vec<Vec<FieldValue>>;

/// Identifies a table by schema and name.
///
/// Renders as `schema.table`. Comparisons during filtering and reconciliation
/// use that canonical form; the partition parent is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaTable {
    pub schema: String,
    pub table: String,
    /// Nearest parent when this table is a declared partition
    pub parent_partitioned_table: Option<String>,
}

impl SchemaTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            parent_partitioned_table: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_partitioned_table = Some(parent.into());
        self
    }

    /// Same table with `prefix` prepended to the schema name.
    pub fn with_schema_prefix(&self, prefix: &str) -> Self {
        Self {
            schema: format!("{}{}", prefix, self.schema),
            table: self.table.clone(),
            parent_partitioned_table: self.parent_partitioned_table.clone(),
        }
    }

    /// SQL-safe `"schema"."table"` form.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    pub fn is_partition(&self) -> bool {
        self.parent_partitioned_table.is_some()
    }
}

impl fmt::Display for SchemaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Column metadata needed to describe a table to the destination.
///
/// Numeric, length and precision fields are 0 when they do not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    /// 1-based position in the source table definition
    pub ordinal_position: i32,
    pub character_maximum_length: i32,
    pub numeric_precision: i32,
    pub numeric_scale: i32,
    pub datetime_precision: i32,
}
