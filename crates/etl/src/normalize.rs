//! Schema Normalizer: project onto the column set and cast everything to text.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tracing::info;

use tablesync_core::ColumnSet;

use crate::error::EtlError;
use crate::reader::RecordSet;

/// Output schema: the column set in order, every field nullable `Utf8`.
pub fn text_schema(columns: &ColumnSet) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Select and cast one batch. Columns outside the set are dropped.
pub fn normalize_batch(
    batch: &RecordBatch,
    columns: &ColumnSet,
    schema: &SchemaRef,
) -> Result<RecordBatch, EtlError> {
    let arrays = columns
        .iter()
        .map(|name| {
            let column = batch
                .column_by_name(name)
                .ok_or_else(|| EtlError::MissingColumn {
                    column: name.to_string(),
                })?;
            Ok(cast(column, &DataType::Utf8)?)
        })
        .collect::<Result<Vec<ArrayRef>, EtlError>>()?;

    Ok(RecordBatch::try_new(schema.clone(), arrays)?)
}

/// Normalize every batch of `records` and concatenate them into one batch.
pub fn normalize(records: &RecordSet, columns: &ColumnSet) -> Result<RecordBatch, EtlError> {
    if let Some(missing) = columns
        .iter()
        .find(|name| records.schema().field_with_name(name).is_err())
    {
        return Err(EtlError::MissingColumn {
            column: missing.to_string(),
        });
    }

    let schema = text_schema(columns);
    let normalized = records
        .batches()
        .iter()
        .map(|batch| normalize_batch(batch, columns, &schema))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = concat_batches(&schema, &normalized)?;

    info!(
        rows = batch.num_rows(),
        columns = columns.len(),
        dropped = records.schema().fields().len().saturating_sub(columns.len()),
        "records normalized"
    );

    Ok(batch)
}
