// ABOUTME: Local directory destination laid out as <root>/<schema>/<table>/
// ABOUTME: Column metadata as JSON, rows as one JSON-lines file per batch

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{DestinationReader, DestinationWriter};
use crate::error::{Result, SyncError};
use crate::source::BatchSource;
use crate::types::{ColumnDescriptor, FieldValue, RowBatch, SchemaTable};

const COLUMNS_FILE: &str = "columns.json";
const STAGING_MARKER: &str = ".staging-";

/// Destination that mirrors tables into a directory tree.
///
/// ```text
/// <root>/<schema>/<table>/columns.json
/// <root>/<schema>/<table>/data-00000.jsonl
/// <root>/<schema>/<table>/data-00001.jsonl
/// ```
///
/// Schema and table names are percent-encoded into directory names (see
/// [`encode_name`]), so any identifier PostgreSQL accepts can be stored.
/// A table write goes into a hidden staging directory next to the table and
/// replaces the table directory only once every batch is on disk.
#[derive(Debug, Clone)]
pub struct LocalDestination {
    root: PathBuf,
}

impl LocalDestination {
    /// Use `root` as the store without touching the filesystem.
    ///
    /// A missing root reads as an empty store; writes create directories
    /// as they need them.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root` as the store, creating it if needed.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            SyncError::destination(format!("Failed to create storage root {}", root.display()), e)
        })?;
        Ok(Self { root })
    }

    fn schema_dir(&self, schema: &str) -> Result<PathBuf> {
        Ok(self.root.join(encode_name(schema)?))
    }

    fn table_dir(&self, table: &SchemaTable) -> Result<PathBuf> {
        Ok(self.schema_dir(&table.schema)?.join(encode_name(&table.table)?))
    }

    /// Column metadata of a stored table.
    pub async fn read_columns(&self, table: &SchemaTable) -> Result<Vec<ColumnDescriptor>> {
        let path = self.table_dir(table)?.join(COLUMNS_FILE);
        let contents = fs::read(&path).await.map_err(|e| io_error(&path, "read", e))?;
        serde_json::from_slice(&contents).map_err(|e| {
            SyncError::destination(format!("Failed to read columns of {}", table), e)
        })
    }

    /// All rows of a stored table, batch files in order.
    pub async fn read_rows(&self, table: &SchemaTable) -> Result<RowBatch> {
        let mut rows = Vec::new();
        for path in data_files(&self.table_dir(table)?).await? {
            let contents = fs::read_to_string(&path)
                .await
                .map_err(|e| io_error(&path, "read", e))?;
            for line in contents.lines() {
                let row: Vec<FieldValue> = serde_json::from_str(line).map_err(|e| {
                    SyncError::destination(format!("Corrupt row in {}", path.display()), e)
                })?;
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn stage_table(
        &self,
        staging: &Path,
        table: &SchemaTable,
        columns: &[ColumnDescriptor],
        batches: &mut (dyn BatchSource + Send),
    ) -> Result<u64> {
        fs::create_dir_all(staging)
            .await
            .map_err(|e| io_error(staging, "create", e))?;

        let columns_path = staging.join(COLUMNS_FILE);
        let encoded = serde_json::to_vec_pretty(columns).map_err(|e| {
            SyncError::destination(format!("Failed to encode columns of {}", table), e)
        })?;
        fs::write(&columns_path, encoded)
            .await
            .map_err(|e| io_error(&columns_path, "write", e))?;

        let mut written = 0u64;
        let mut batch_index = 0usize;
        loop {
            let batch = batches.next_batch()?;
            if batch.is_empty() {
                break;
            }

            let mut buffer = Vec::new();
            for row in &batch {
                serde_json::to_writer(&mut buffer, row).map_err(|e| {
                    SyncError::destination(format!("Failed to encode row of {}", table), e)
                })?;
                buffer.push(b'\n');
            }

            let path = staging.join(format!("data-{:05}.jsonl", batch_index));
            fs::write(&path, buffer)
                .await
                .map_err(|e| io_error(&path, "write", e))?;

            debug!("Wrote batch {} of {} ({} rows)", batch_index, table, batch.len());
            written += batch.len() as u64;
            batch_index += 1;
        }

        Ok(written)
    }
}

impl DestinationWriter for LocalDestination {
    async fn write_table(
        &self,
        table: &SchemaTable,
        columns: &[ColumnDescriptor],
        batches: &mut (dyn BatchSource + Send),
    ) -> Result<u64> {
        let target = self.table_dir(table)?;
        let staging = self.schema_dir(&table.schema)?.join(format!(
            ".{}{}{:08x}",
            encode_name(&table.table)?,
            STAGING_MARKER,
            rand::random::<u32>()
        ));

        let written = match self.stage_table(&staging, table, columns, batches).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(e);
            }
        };

        remove_dir_if_exists(&target).await?;
        fs::rename(&staging, &target)
            .await
            .map_err(|e| io_error(&target, "replace", e))?;

        info!("Stored {} row(s) of {} in {}", written, table, target.display());

        Ok(written)
    }

    async fn delete_schema(&self, schema: &str) -> Result<()> {
        let path = self.schema_dir(schema)?;
        remove_dir_if_exists(&path).await?;
        info!("Deleted schema {}", schema);
        Ok(())
    }

    async fn delete_schema_table(&self, table: &SchemaTable) -> Result<()> {
        let path = self.table_dir(table)?;
        remove_dir_if_exists(&path).await?;
        info!("Deleted table {}", table);
        Ok(())
    }
}

impl DestinationReader for LocalDestination {
    async fn schemas(&self) -> Result<Vec<String>> {
        Ok(list_dirs(&self.root)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    async fn schema_tables(&self) -> Result<Vec<SchemaTable>> {
        let mut tables = Vec::new();
        for (schema, schema_path) in list_dirs(&self.root).await? {
            for (table, _) in list_dirs(&schema_path).await? {
                tables.push(SchemaTable::new(schema.clone(), table));
            }
        }
        Ok(tables)
    }
}

/// Directory name for a schema or table name.
///
/// ASCII letters, digits, `_` and `-` are kept; every other byte is written
/// as `%XX`. The result never starts with `.` and never contains a path
/// separator, so staging directories stay distinguishable.
pub fn encode_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(SyncError::destination(
            "Invalid object name ''",
            "schema and table names must not be empty",
        ));
    }

    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(encoded)
}

/// Inverse of [`encode_name`]. `None` when `encoded` is not a valid encoding.
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded
                .get(i + 1..i + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok().filter(|name| !name.is_empty())
}

/// Decoded names and paths of visible subdirectories, sorted by name.
/// Staging directories are hidden.
async fn list_dirs(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path, "list", e)),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error(path, "list", e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| io_error(&entry.path(), "stat", e))?
            .is_dir();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !is_dir || file_name.starts_with('.') {
            continue;
        }
        match decode_name(&file_name) {
            Some(name) => dirs.push((name, entry.path())),
            None => warn!("Skipping unrecognised directory {}", entry.path().display()),
        }
    }
    dirs.sort();
    Ok(dirs)
}

async fn data_files(table_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(table_dir)
        .await
        .map_err(|e| io_error(table_dir, "list", e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error(table_dir, "list", e))?
    {
        let path = entry.path();
        let is_data = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("data-") && n.ends_with(".jsonl"));
        if is_data {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, "remove", e)),
    }
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> SyncError {
    SyncError::destination(format!("Failed to {} {}", action, path.display()), e)
}
