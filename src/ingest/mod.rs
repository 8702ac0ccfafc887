// Record preprocessing: turns raw tabular sensor rows into flattened
// Documents ready for embedding.


use std::fs::File;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FloatError, Result};

/// One indexed unit: a flattened sensor record plus its position in the
/// source table. Immutable once created; `row_index` is the only ordering
/// guarantee that survives across chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub row_index: u64,
}

/// Streams a delimited file in fixed-size row chunks to bound peak memory
/// when the source table is arbitrarily large.
pub struct CsvChunks {
    reader: csv::Reader<File>,
    chunk_size: usize,
    done: bool,
}

impl CsvChunks {
    #[inline]
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(FloatError::Ingestion(
                "chunk size must be greater than 0".to_string(),
            ));
        }

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| {
                FloatError::Ingestion(format!("failed to open {}: {e}", path.display()))
            })?;

        Ok(Self {
            reader,
            chunk_size,
            done: false,
        })
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Vec<csv::StringRecord>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut rows = Vec::new();
        let mut record = csv::StringRecord::new();

        while rows.len() < self.chunk_size {
            match self.reader.read_record(&mut record) {
                Ok(true) => rows.push(record.clone()),
                Ok(false) => {
                    self.done = true;
                    break;
                }
                // A malformed row fails the whole chunk; ingestion is
                // re-run from a clean source file rather than patched.
                Err(e) => {
                    self.done = true;
                    return Some(Err(FloatError::Ingestion(format!("malformed row: {e}"))));
                }
            }
        }

        if rows.is_empty() {
            None
        } else {
            debug!("Read chunk of {} rows", rows.len());
            Some(Ok(rows))
        }
    }
}

/// Concatenate all field values of a row, space-separated, preserving
/// column order.
#[inline]
pub fn flatten_record(record: &csv::StringRecord) -> String {
    record.iter().join(" ")
}

/// Convert one chunk of rows into Documents. The running row counter is
/// passed in and handed back so `row_index` stays globally monotonic
/// across chunks without any shared accumulator.
#[inline]
pub fn preprocess_chunk(
    rows: &[csv::StringRecord],
    next_row_index: u64,
) -> (Vec<Document>, u64) {
    let documents: Vec<Document> = rows
        .iter()
        .enumerate()
        .map(|(offset, record)| Document {
            text: flatten_record(record),
            row_index: next_row_index + offset as u64,
        })
        .collect();

    let next = next_row_index + documents.len() as u64;
    (documents, next)
}
