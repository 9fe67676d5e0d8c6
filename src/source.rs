//! Chunk sources for lazy, forward-only file streaming.
//!
//! A [`ChunkSource`] produces an ordered, finite sequence of record
//! batches from a file, independent of format. File sources materialize
//! every column as `Utf8` so the engine sees the raw textual values;
//! Parquet keeps its native types. Malformed rows are warned and skipped
//! without aborting the stream; unreadable files and unsupported formats
//! fail the stream as a whole.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, Lines, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, RecordBatch, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use calamine::{open_workbook, Reader as XlsxReader, Xlsx};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A source that can produce record batches on demand.
///
/// Lazy, forward-only and finite. Implementations must surface
/// malformed-row warnings without aborting the stream and fail loudly on
/// unsupported formats or I/O errors.
pub trait ChunkSource: Send + fmt::Debug {
    /// Returns the schema of the data.
    fn schema(&self) -> SchemaRef;

    /// Returns the next chunk, or `None` when the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the next chunk fails; such an error is
    /// fatal to the audit consuming this source.
    fn next_chunk(&mut self) -> Result<Option<RecordBatch>>;

    /// Returns an estimate of total rows, if known.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// Open the right source for a path based on its extension.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown extensions and
/// [`Error::Io`] if the file cannot be opened.
pub fn open_source(path: impl AsRef<Path>, chunk_size: usize) -> Result<Box<dyn ChunkSource>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    debug!(path = %path.display(), extension = %extension, chunk_size, "opening chunk source");

    match extension.as_str() {
        "csv" => Ok(Box::new(CsvSource::new(path, chunk_size)?)),
        "json" | "jsonl" => Ok(Box::new(JsonSource::new(path, chunk_size)?)),
        "xlsx" => Ok(Box::new(XlsxSource::new(path, chunk_size)?)),
        "parquet" => Ok(Box::new(ParquetChunkSource::new(path, chunk_size)?)),
        other => Err(Error::unsupported_format(format!(".{}", other))),
    }
}

/// Build an all-`Utf8`, all-nullable schema from column names.
fn utf8_schema(names: &[String]) -> SchemaRef {
    let fields: Vec<Field> = names
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Assemble a batch from row-major string cells.
fn rows_to_batch(schema: &SchemaRef, rows: Vec<Vec<Option<String>>>) -> Result<RecordBatch> {
    let n_cols = schema.fields().len();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); n_cols];
    for row in rows {
        for (col_idx, value) in row.into_iter().enumerate() {
            if col_idx < n_cols {
                columns[col_idx].push(value);
            }
        }
    }
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|values| Arc::new(StringArray::from(values)) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::clone(schema), arrays).map_err(Error::Arrow)
}

/// Streaming CSV source.
///
/// The header row defines the column set; every value is read as text.
/// Rows with the wrong field count and undecodable rows are skipped with
/// a warning, mirroring permissive bulk-ingest behavior.
pub struct CsvSource {
    reader: csv::Reader<BufReader<File>>,
    schema: SchemaRef,
    chunk_size: usize,
    skipped_rows: usize,
}

impl fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvSource")
            .field("schema", &self.schema)
            .field("chunk_size", &self.chunk_size)
            .field("skipped_rows", &self.skipped_rows)
            .finish_non_exhaustive()
    }
}

impl CsvSource {
    /// Open a CSV file and read its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the header row
    /// cannot be parsed.
    pub fn new(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = reader
            .headers()
            .map_err(|e| Error::parse(format!("CSV header: {}", e)))?;
        let names: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        Ok(Self {
            reader,
            schema: utf8_schema(&names),
            chunk_size: chunk_size.max(1),
            skipped_rows: 0,
        })
    }

    /// Number of malformed rows skipped so far.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl ChunkSource for CsvSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        let n_cols = self.schema.fields().len();
        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(self.chunk_size);
        let mut record = csv::StringRecord::new();

        while rows.len() < self.chunk_size {
            match self.reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {
                    if record.len() != n_cols {
                        warn!(
                            expected = n_cols,
                            got = record.len(),
                            "skipping malformed CSV row"
                        );
                        self.skipped_rows += 1;
                        continue;
                    }
                    let row: Vec<Option<String>> = record
                        .iter()
                        .map(|field| {
                            if field.is_empty() {
                                None
                            } else {
                                Some(field.to_string())
                            }
                        })
                        .collect();
                    rows.push(row);
                }
                Err(e) if e.is_io_error() => {
                    return Err(match e.into_kind() {
                        csv::ErrorKind::Io(io_err) => Error::io_no_path(io_err),
                        other => Error::parse(format!("CSV read: {:?}", other)),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "skipping undecodable CSV row");
                    self.skipped_rows += 1;
                }
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        rows_to_batch(&self.schema, rows).map(Some)
    }
}

enum JsonRecords {
    /// JSON-lines, streamed lazily.
    Lines(Lines<BufReader<File>>),
    /// A single top-level array of records, served in chunks.
    Array(std::vec::IntoIter<serde_json::Map<String, serde_json::Value>>),
}

/// Record-oriented JSON source.
///
/// Accepts either JSON-lines (one object per line) or a single top-level
/// array of objects. Columns are discovered from the first record, in key
/// order; scalar values are stringified, nested values keep their JSON
/// text, and `null` becomes a missing cell.
pub struct JsonSource {
    records: JsonRecords,
    schema: SchemaRef,
    names: Vec<String>,
    chunk_size: usize,
    skipped_rows: usize,
}

impl fmt::Debug for JsonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSource")
            .field("schema", &self.schema)
            .field("names", &self.names)
            .field("chunk_size", &self.chunk_size)
            .field("skipped_rows", &self.skipped_rows)
            .finish_non_exhaustive()
    }
}

impl JsonSource {
    /// Open a JSON or JSON-lines file and discover its columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, a top-level array
    /// cannot be parsed, or the first record is not an object.
    pub fn new(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| Error::io(e, path))?;

        // Sniff the first non-whitespace byte to pick the layout.
        let mut head = [0u8; 256];
        let read = file.read(&mut head).map_err(|e| Error::io(e, path))?;
        let first_byte = head[..read]
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace());
        file.seek(SeekFrom::Start(0)).map_err(|e| Error::io(e, path))?;

        if first_byte == Some(b'[') {
            let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| Error::parse(format!("JSON: {}", e)))?;
            let serde_json::Value::Array(items) = value else {
                return Err(Error::parse("expected a top-level JSON array"));
            };
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_json::Value::Object(map) => records.push(map),
                    other => {
                        warn!(value = %other, "skipping non-object JSON record");
                    }
                }
            }
            let names: Vec<String> = records
                .first()
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_default();
            Ok(Self {
                schema: utf8_schema(&names),
                names,
                records: JsonRecords::Array(records.into_iter()),
                chunk_size: chunk_size.max(1),
                skipped_rows: 0,
            })
        } else {
            // JSON-lines: parse the first line for the column set, then
            // re-open so the stream starts from the beginning.
            let mut first_line = String::new();
            let mut reader = BufReader::new(file);
            reader
                .read_line(&mut first_line)
                .map_err(|e| Error::io(e, path))?;
            let names: Vec<String> = if first_line.trim().is_empty() {
                Vec::new()
            } else {
                let map: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(first_line.trim())
                        .map_err(|e| Error::parse(format!("JSON line 1: {}", e)))?;
                map.keys().cloned().collect()
            };

            let file = File::open(path).map_err(|e| Error::io(e, path))?;
            Ok(Self {
                schema: utf8_schema(&names),
                names,
                records: JsonRecords::Lines(BufReader::new(file).lines()),
                chunk_size: chunk_size.max(1),
                skipped_rows: 0,
            })
        }
    }

}

/// Project a JSON object onto the discovered column set.
fn record_to_row(
    names: &[String],
    map: &serde_json::Map<String, serde_json::Value>,
) -> Vec<Option<String>> {
    names
        .iter()
        .map(|name| match map.get(name) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect()
}

impl ChunkSource for JsonSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(self.chunk_size);

        while rows.len() < self.chunk_size {
            let record = match &mut self.records {
                JsonRecords::Array(iter) => match iter.next() {
                    Some(map) => Some(map),
                    None => break,
                },
                JsonRecords::Lines(lines) => match lines.next() {
                    Some(Ok(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                            trimmed,
                        ) {
                            Ok(map) => Some(map),
                            Err(e) => {
                                warn!(error = %e, "skipping malformed JSON line");
                                self.skipped_rows += 1;
                                None
                            }
                        }
                    }
                    Some(Err(e)) => return Err(Error::io_no_path(e)),
                    None => break,
                },
            };

            if let Some(map) = record {
                rows.push(record_to_row(&self.names, &map));
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        rows_to_batch(&self.schema, rows).map(Some)
    }
}

/// XLSX source reading the first worksheet.
///
/// The first row is the header; cells are stringified and empty cells
/// become missing values. The sheet is materialized by the reader, so
/// chunking bounds downstream work rather than file I/O.
pub struct XlsxSource {
    rows: std::vec::IntoIter<Vec<Option<String>>>,
    schema: SchemaRef,
    chunk_size: usize,
    remaining: usize,
}

impl fmt::Debug for XlsxSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XlsxSource")
            .field("schema", &self.schema)
            .field("chunk_size", &self.chunk_size)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl XlsxSource {
    /// Open an XLSX workbook and read its first worksheet.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be opened or has no
    /// readable worksheet.
    pub fn new(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| Error::parse(format!("XLSX open: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::parse("XLSX: no worksheet found"))?
            .map_err(|e| Error::parse(format!("XLSX range: {}", e)))?;

        let mut sheet_rows = range.rows();
        let names: Vec<String> = sheet_rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| cell_to_string(cell).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let n_cols = names.len();
        let data_rows: Vec<Vec<Option<String>>> = sheet_rows
            .map(|row| {
                (0..n_cols)
                    .map(|i| row.get(i).and_then(cell_to_string))
                    .collect()
            })
            .collect();

        let remaining = data_rows.len();
        Ok(Self {
            rows: data_rows.into_iter(),
            schema: utf8_schema(&names),
            chunk_size: chunk_size.max(1),
            remaining,
        })
    }
}

fn cell_to_string(cell: &calamine::Data) -> Option<String> {
    if matches!(cell, calamine::Data::Empty) {
        return None;
    }
    let rendered = match cell {
        calamine::Data::String(s) => s.clone(),
        other => format!("{}", other),
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

impl ChunkSource for XlsxSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        let rows: Vec<Vec<Option<String>>> = self.rows.by_ref().take(self.chunk_size).collect();
        if rows.is_empty() {
            return Ok(None);
        }
        self.remaining = self.remaining.saturating_sub(rows.len());
        rows_to_batch(&self.schema, rows).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Chunked Parquet source. Batches keep their native Arrow types.
pub struct ParquetChunkSource {
    reader: parquet::arrow::arrow_reader::ParquetRecordBatchReader,
    schema: SchemaRef,
}

impl fmt::Debug for ParquetChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParquetChunkSource")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ParquetChunkSource {
    /// Open a Parquet file for chunked reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid
    /// Parquet.
    pub fn new(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(e, path))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(Error::Parquet)?
            .with_batch_size(chunk_size.max(1));

        let schema = builder.schema().clone();
        let reader = builder.build().map_err(Error::Parquet)?;

        Ok(Self { reader, schema })
    }
}

impl ChunkSource for ParquetChunkSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        match self.reader.next() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(Error::Arrow(e)),
            None => Ok(None),
        }
    }
}

/// A source backed by in-memory record batches.
///
/// Useful for testing or when data already lives in memory but should go
/// through the streaming interface.
#[derive(Debug)]
pub struct MemoryChunkSource {
    batches: Vec<RecordBatch>,
    schema: SchemaRef,
    position: usize,
}

impl MemoryChunkSource {
    /// Create a memory source from batches sharing one schema.
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        let schema = batches
            .first()
            .map(|batch| batch.schema())
            .unwrap_or_else(|| Arc::new(Schema::empty()));
        Self {
            batches,
            schema,
            position: 0,
        }
    }
}

impl ChunkSource for MemoryChunkSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        let batch = self.batches.get(self.position).cloned();
        self.position += 1;
        Ok(batch)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.batches.iter().map(|b| b.num_rows()).sum())
    }
}
