// ABOUTME: Pull-based batch pipeline over an exported CSV stream
// ABOUTME: Yields bounded RowBatches until a sticky end-of-stream

use std::io::Read;

use super::export::PG_NULL_STRING;
use crate::error::{Result, SyncError};
use crate::types::RowBatch;

/// Source of row batches, driven by the destination writer.
pub trait BatchSource {
    /// Return the next non-empty batch, or an empty batch at end of stream.
    ///
    /// Once an empty batch has been returned, every later call returns an
    /// empty batch as well.
    fn next_batch(&mut self) -> Result<RowBatch>;
}

/// Single-pass batch iterator over an exported table.
///
/// The header row is consumed on construction and exposed through
/// [`BatchPipeline::header`]. Rewinding requires a fresh export.
pub struct BatchPipeline<R> {
    reader: csv::Reader<R>,
    header: Vec<String>,
    null_marker: String,
    max_batch_rows: usize,
    reached_end: bool,
    rows_read: u64,
    batches_read: u64,
}

impl<R: Read> BatchPipeline<R> {
    /// Wrap a CSV stream and read its header row.
    pub fn new(source: R, max_batch_rows: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source);

        let header = reader
            .headers()
            .map_err(|e| SyncError::parse("Failed to read export header", e))?
            .iter()
            .map(String::from)
            .collect();

        Ok(Self {
            reader,
            header,
            null_marker: PG_NULL_STRING.to_string(),
            max_batch_rows: max_batch_rows.max(1),
            reached_end: false,
            rows_read: 0,
            batches_read: 0,
        })
    }

    /// Treat fields equal to `marker` as SQL NULL instead of [`PG_NULL_STRING`].
    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = marker.into();
        self
    }

    /// Column names in export order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Rows handed out so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Non-empty batches handed out so far.
    pub fn batches_read(&self) -> u64 {
        self.batches_read
    }

    pub fn is_exhausted(&self) -> bool {
        self.reached_end
    }
}

impl<R: Read> BatchSource for BatchPipeline<R> {
    fn next_batch(&mut self) -> Result<RowBatch> {
        if self.reached_end {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(self.max_batch_rows.min(1024));
        let mut record = csv::StringRecord::new();

        while rows.len() < self.max_batch_rows {
            match self.reader.read_record(&mut record) {
                Ok(true) => rows.push(
                    record
                        .iter()
                        .map(|field| (field != self.null_marker).then(|| field.to_string()))
                        .collect(),
                ),
                Ok(false) => {
                    self.reached_end = true;
                    break;
                }
                Err(e) => {
                    // A broken stream is never read again
                    self.reached_end = true;
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    return Err(SyncError::parse(
                        format!("Malformed exported row near line {}", line),
                        e,
                    ));
                }
            }
        }

        if !rows.is_empty() {
            self.rows_read += rows.len() as u64;
            self.batches_read += 1;
        }

        Ok(rows)
    }
}
