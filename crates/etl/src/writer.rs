//! Columnar Writer: encode normalized records as Parquet under the destination.

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tablesync_core::Compression;

use crate::context::JobContext;
use crate::error::EtlError;

/// A Parquet object created by this run.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    /// Key relative to the destination location.
    pub key: String,
    pub uri: String,
    pub rows: usize,
    pub bytes: usize,
}

pub fn parquet_compression(codec: Compression) -> ParquetCompression {
    match codec {
        Compression::Snappy => ParquetCompression::SNAPPY,
        Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
        Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        Compression::Lz4 => ParquetCompression::LZ4_RAW,
        Compression::None => ParquetCompression::UNCOMPRESSED,
    }
}

/// `part-00000-<run_id>.snappy.parquet`; unique per run so reruns never overwrite.
pub fn output_file_name(index: usize, run_id: &Uuid, codec: Compression) -> String {
    match codec.file_infix() {
        Some(infix) => format!("part-{:05}-{}.{}.parquet", index, run_id, infix),
        None => format!("part-{:05}-{}.parquet", index, run_id),
    }
}

fn writer_properties(ctx: &JobContext) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(parquet_compression(ctx.config.parquet.compression))
        .set_key_value_metadata(Some(vec![
            parquet::format::KeyValue::new(
                "tablesync.job_name".to_string(),
                Some(ctx.job_name.clone()),
            ),
            parquet::format::KeyValue::new(
                "tablesync.run_id".to_string(),
                Some(ctx.run_id.to_string()),
            ),
        ]))
        .build()
}

/// Encode one batch into an in-memory Parquet file.
pub fn encode_parquet(batch: &RecordBatch, props: WriterProperties) -> Result<Vec<u8>, EtlError> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

/// Split `batch` into consecutive slices of at most `rows_per_file` rows.
///
/// An empty batch yields one empty slice so the schema is still written.
pub fn split_rows(batch: &RecordBatch, rows_per_file: usize) -> Vec<RecordBatch> {
    let total = batch.num_rows();
    if total == 0 {
        return vec![batch.clone()];
    }
    let chunk = rows_per_file.max(1);
    (0..total)
        .step_by(chunk)
        .map(|offset| batch.slice(offset, chunk.min(total - offset)))
        .collect()
}

/// Write `batch` as one or more Parquet objects under the destination location.
///
/// Existing objects at the destination are left alone.
pub async fn write_parquet(
    ctx: &JobContext,
    batch: &RecordBatch,
) -> Result<Vec<WrittenFile>, EtlError> {
    let destination = ctx.destination();
    let codec = ctx.config.parquet.compression;

    if batch.num_rows() == 0 {
        warn!(location = %destination.location(), "no rows to write, emitting schema-only file");
    }

    let mut written = Vec::new();
    for (index, chunk) in split_rows(batch, ctx.config.parquet.rows_per_file)
        .iter()
        .enumerate()
    {
        let data = encode_parquet(chunk, writer_properties(ctx))?;
        let key = output_file_name(index, &ctx.run_id, codec);
        let size = data.len();

        destination.put(&key, Bytes::from(data)).await?;
        debug!(key = %key, rows = chunk.num_rows(), bytes = size, "wrote parquet file");

        written.push(WrittenFile {
            uri: destination.uri_for(&key),
            key,
            rows: chunk.num_rows(),
            bytes: size,
        });
    }

    info!(
        location = %destination.location(),
        files = written.len(),
        rows = batch.num_rows(),
        compression = %codec,
        "parquet written"
    );

    Ok(written)
}
