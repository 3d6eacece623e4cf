//! Source Reader: load every CSV object under the source location.
//!
//! Each file is inferred on its own (header row + type sniffing), the
//! inferred types are merged across files, and every file is then decoded
//! with its own header order and the merged types. Batches keep the column
//! order of the file they came from; consumers select columns by name.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{new_null_array, ArrayRef};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use bytes::Bytes;
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::EtlError;

const BATCH_SIZE: usize = 8192;

/// A source object that contributed rows.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub key: String,
    pub rows: usize,
}

/// Rows loaded from the source, with the merged inferred schema.
#[derive(Debug, Clone)]
pub struct RecordSet {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    files: Vec<SourceFile>,
}

impl RecordSet {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>, files: Vec<SourceFile>) -> Self {
        Self {
            schema,
            batches,
            files,
        }
    }

    /// Union of all file schemas, in first-seen column order.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Render the first `limit` rows as a table, columns in merged order.
    pub fn preview(&self, limit: usize) -> Result<String, ArrowError> {
        let mut shown = Vec::new();
        let mut remaining = limit;
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.num_rows());
            shown.push(align_to_schema(&batch.slice(0, take), &self.schema)?);
            remaining -= take;
        }

        let mut out = if shown.is_empty() {
            pretty_format_batches(&[RecordBatch::new_empty(self.schema.clone())])?.to_string()
        } else {
            pretty_format_batches(&shown)?.to_string()
        };

        let total = self.num_rows();
        if total > limit {
            out.push_str(&format!("\nonly showing top {} of {} rows", limit, total));
        }
        Ok(out)
    }
}

/// Project `batch` onto `schema` by column name, filling absent columns with nulls.
fn align_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) => column.clone(),
            None => new_null_array(field.data_type(), batch.num_rows()),
        })
        .collect();
    RecordBatch::try_new(schema.clone(), columns)
}

/// Widen two inferred types to one both can be decoded as.
pub(crate) fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        _ if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

/// Merge per-file schemas by column name, widening conflicting types.
pub(crate) fn merge_schemas(schemas: &[Schema]) -> Schema {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();

    for schema in schemas {
        for field in schema.fields() {
            match types.get_mut(field.name()) {
                Some(existing) => *existing = widen(existing, field.data_type()),
                None => {
                    order.push(field.name().clone());
                    types.insert(field.name().clone(), field.data_type().clone());
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let data_type = types.remove(&name).unwrap_or(DataType::Utf8);
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

/// A file's own column order with the merged types.
fn file_read_schema(file_schema: &Schema, merged: &Schema) -> SchemaRef {
    let fields: Vec<Field> = file_schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = merged
                .field_with_name(field.name())
                .map(|f| f.data_type().clone())
                .unwrap_or(DataType::Utf8);
            Field::new(field.name(), data_type, true)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Decode in-memory CSV files (first row is the header) into a [`RecordSet`].
pub fn decode_csv_files(files: &[(String, Bytes)]) -> Result<RecordSet, EtlError> {
    let format = Format::default().with_header(true);

    let mut inferred = Vec::with_capacity(files.len());
    for (key, data) in files {
        let (schema, records) = format
            .infer_schema(Cursor::new(data.as_ref()), None)
            .map_err(|source| EtlError::Decode {
                key: key.clone(),
                source,
            })?;
        debug!(key = %key, records, columns = schema.fields().len(), "inferred schema");
        inferred.push(schema);
    }

    let merged = Arc::new(merge_schemas(&inferred));

    let mut batches = Vec::new();
    let mut sources = Vec::with_capacity(files.len());
    for ((key, data), file_schema) in files.iter().zip(&inferred) {
        let reader = ReaderBuilder::new(file_read_schema(file_schema, &merged))
            .with_header(true)
            .with_batch_size(BATCH_SIZE)
            .build(Cursor::new(data.clone()))
            .map_err(|source| EtlError::Decode {
                key: key.clone(),
                source,
            })?;

        let mut rows = 0;
        for batch in reader {
            let batch = batch.map_err(|source| EtlError::Decode {
                key: key.clone(),
                source,
            })?;
            rows += batch.num_rows();
            batches.push(batch);
        }
        sources.push(SourceFile {
            key: key.clone(),
            rows,
        });
    }

    Ok(RecordSet::new(merged, batches, sources))
}

/// Load every visible, non-empty object under the source location.
pub async fn read_source(ctx: &JobContext) -> Result<RecordSet, EtlError> {
    let source = ctx.source();
    let entries = source.list().await?;
    let total = entries.len();

    let data_files: Vec<_> = entries
        .into_iter()
        .filter(|e| !e.is_hidden() && e.size > 0)
        .collect();

    if data_files.is_empty() {
        return Err(EtlError::SourceEmpty(source.location().to_string()));
    }

    let mut files = Vec::with_capacity(data_files.len());
    for entry in data_files {
        let data = source.get(&entry.key).await?;
        files.push((entry.key, data));
    }

    let records = decode_csv_files(&files)?;

    info!(
        location = %source.location(),
        files = records.files().len(),
        skipped = total - records.files().len(),
        rows = records.num_rows(),
        columns = records.schema().fields().len(),
        "source loaded"
    );

    Ok(records)
}
