// ABOUTME: Catalog enumeration inside the snapshot transaction
// ABOUTME: Lists schemas, base tables with partition parents, and header-ordered columns

use tokio_postgres::Transaction;

use crate::error::{Result, SyncError};
use crate::types::{ColumnDescriptor, SchemaTable};

/// Schemas that are never mirrored.
pub const SYSTEM_SCHEMAS: [&str; 3] = ["pg_catalog", "pg_toast", "information_schema"];

/// Reads source catalog metadata.
///
/// Borrows the snapshot transaction, so every listing observes the same
/// database state as the table exports.
pub struct CatalogReader<'a> {
    client: &'a Transaction<'a>,
}

impl<'a> CatalogReader<'a> {
    pub fn new(client: &'a Transaction<'a>) -> Self {
        Self { client }
    }

    /// List every non-system schema.
    pub async fn list_schemas(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT schema_name::text
                 FROM information_schema.schemata
                 WHERE schema_name::text <> ALL($1)
                 ORDER BY schema_name",
                &[&SYSTEM_SCHEMAS.as_slice()],
            )
            .await
            .map_err(|e| SyncError::catalog("Failed to list schemas", e))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// List the base tables of a schema.
    ///
    /// Views, indexes and sequences are excluded. Partitions carry the name
    /// of their nearest parent.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<SchemaTable>> {
        let rows = self
            .client
            .query(
                "SELECT pg_class.relname::text AS table,
                        COALESCE(parent.relname::text, '') AS parent_partitioned_table
                 FROM pg_class
                 JOIN pg_namespace ON pg_namespace.oid = pg_class.relnamespace
                 LEFT JOIN pg_inherits ON pg_inherits.inhrelid = pg_class.oid
                 LEFT JOIN pg_class AS parent ON pg_inherits.inhparent = parent.oid
                 WHERE pg_namespace.nspname = $1 AND pg_class.relkind = 'r'
                 ORDER BY pg_class.relname",
                &[&schema],
            )
            .await
            .map_err(|e| {
                SyncError::catalog(format!("Failed to list tables in schema {}", schema), e)
            })?;

        Ok(rows
            .iter()
            .map(|row| {
                let table = SchemaTable::new(schema, row.get::<_, String>(0));
                let parent: String = row.get(1);
                if parent.is_empty() {
                    table
                } else {
                    table.with_parent(parent)
                }
            })
            .collect())
    }

    /// Column metadata for a table, in the order of `exported_header`.
    ///
    /// `exported_header` is the header row already read from the table's
    /// export, so this must run after the export. Only exported columns are
    /// returned: COPY leaves out generated columns, the catalog does not.
    /// The result is checked against the header and a mismatch is a catalog
    /// error.
    pub async fn list_columns(
        &self,
        table: &SchemaTable,
        exported_header: &[String],
    ) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .client
            .query(
                "SELECT
                    column_name::text,
                    data_type::text,
                    udt_name::text,
                    is_nullable::text,
                    ordinal_position::int4,
                    COALESCE(character_maximum_length, 0)::int4,
                    COALESCE(numeric_precision, 0)::int4,
                    COALESCE(numeric_scale, 0)::int4,
                    COALESCE(datetime_precision, 0)::int4
                 FROM information_schema.columns
                 WHERE table_schema::text = $1
                   AND table_name::text = $2
                   AND column_name::text = ANY($3::text[])
                 ORDER BY array_position($3::text[], column_name::text)",
                &[&table.schema, &table.table, &exported_header],
            )
            .await
            .map_err(|e| {
                SyncError::catalog(format!("Failed to get columns for {}", table), e)
            })?;

        let columns: Vec<ColumnDescriptor> = rows
            .iter()
            .map(|row| ColumnDescriptor {
                column_name: row.get(0),
                data_type: row.get(1),
                udt_name: row.get(2),
                is_nullable: row.get::<_, String>(3) == "YES",
                ordinal_position: row.get(4),
                character_maximum_length: row.get(5),
                numeric_precision: row.get(6),
                numeric_scale: row.get(7),
                datetime_precision: row.get(8),
            })
            .collect();

        ensure_header_order(table, &columns, exported_header)?;

        Ok(columns)
    }
}

/// Columns must line up one-to-one with the export header.
fn ensure_header_order(
    table: &SchemaTable,
    columns: &[ColumnDescriptor],
    exported_header: &[String],
) -> Result<()> {
    let names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
    let header: Vec<&str> = exported_header.iter().map(String::as_str).collect();

    if names != header {
        return Err(SyncError::catalog(
            format!("Column metadata for {} does not match its export header", table),
            format!("header {:?}, catalog {:?}", header, names),
        ));
    }

    Ok(())
}
