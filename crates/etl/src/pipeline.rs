//! Job driver: read → normalize → write → catalog update → commit.
//!
//! Stages run strictly in order. The first failure aborts the run and is
//! reported with the stage it happened in; nothing is retried or rolled back.

use std::fmt::Write as _;
use std::time::Instant;

use arrow::datatypes::Schema;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use tablesync_catalog::{string_columns, CatalogStore, CatalogUpdater};

use crate::bookmark::{self, JobBookmark};
use crate::context::JobContext;
use crate::error::{Stage, StageError};
use crate::normalize::normalize;
use crate::reader::read_source;
use crate::writer::{write_parquet, WrittenFile};

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_name: String,
    pub run_id: Uuid,
    pub source_files: Vec<String>,
    pub rows_read: usize,
    pub rows_written: usize,
    pub files_written: Vec<WrittenFile>,
    pub columns: Vec<String>,
    pub catalog_table: String,
    pub catalog_location: String,
    /// Where the bookmark was stored, when bookmarks are enabled.
    pub bookmark: Option<String>,
    pub elapsed_ms: u128,
}

/// `Column names:` followed by one `{i}: {name:?}` line per column.
pub fn format_column_names(schema: &Schema) -> String {
    let mut out = String::from("Column names:");
    for (i, field) in schema.fields().iter().enumerate() {
        let _ = write!(out, "\n{}: {:?}", i, field.name());
    }
    out
}

/// Run all five stages against `catalog`.
pub async fn run(ctx: &JobContext, catalog: &dyn CatalogStore) -> Result<JobReport, StageError> {
    let start = Instant::now();
    let job = &ctx.config.job;

    // 1. Read
    info!(stage = %Stage::Read, location = %ctx.source().location(), "stage started");
    let records = read_source(ctx)
        .await
        .map_err(|e| StageError::new(Stage::Read, e))?;
    let preview = records
        .preview(job.preview_rows)
        .map_err(|e| StageError::new(Stage::Read, e))?;
    println!("{}", preview);

    // 2. Normalize
    info!(stage = %Stage::Normalize, columns = %ctx.columns(), "stage started");
    let batch = normalize(&records, ctx.columns()).map_err(|e| StageError::new(Stage::Normalize, e))?;

    // 3. Write
    info!(stage = %Stage::Write, location = %ctx.destination().location(), "stage started");
    let files_written = write_parquet(ctx, &batch)
        .await
        .map_err(|e| StageError::new(Stage::Write, e))?;

    // 4. Catalog
    let catalog_cfg = &ctx.config.catalog;
    info!(
        stage = %Stage::Catalog,
        catalog = catalog.kind(),
        database = %catalog_cfg.database,
        table = %catalog_cfg.table,
        "stage started"
    );
    let schema = batch.schema();
    println!("{}", format_column_names(&schema));

    let location = ctx.destination().location().to_string();
    let columns = string_columns(schema.fields().iter().map(|f| f.name().as_str()));
    CatalogUpdater::new(catalog, &catalog_cfg.database, &catalog_cfg.table)
        .with_version_check(catalog_cfg.version_check)
        .apply(columns, &location)
        .await
        .map_err(|e| StageError::new(Stage::Catalog, e))?;

    // 5. Commit
    info!(stage = %Stage::Commit, bookmark = %job.bookmark, "stage started");
    let catalog_table = format!("{}.{}", catalog_cfg.database, catalog_cfg.table);
    let source_files: Vec<String> = records.files().iter().map(|f| f.key.clone()).collect();
    let bookmark = JobBookmark {
        job_name: ctx.job_name.clone(),
        run_id: ctx.run_id,
        started_at: ctx.started_at,
        committed_at: Utc::now(),
        source_location: ctx.source().location().to_string(),
        source_files: source_files.clone(),
        destination_location: location.clone(),
        files_written: files_written.iter().map(|f| f.key.clone()).collect(),
        rows_written: batch.num_rows(),
        catalog_table: catalog_table.clone(),
    };
    let bookmark_location = bookmark::commit(ctx, &bookmark)
        .await
        .map_err(|e| StageError::new(Stage::Commit, e))?;

    let report = JobReport {
        job_name: ctx.job_name.clone(),
        run_id: ctx.run_id,
        source_files,
        rows_read: records.num_rows(),
        rows_written: batch.num_rows(),
        files_written,
        columns: schema.fields().iter().map(|f| f.name().clone()).collect(),
        catalog_table,
        catalog_location: location,
        bookmark: bookmark_location,
        elapsed_ms: start.elapsed().as_millis(),
    };

    info!(
        job = %report.job_name,
        run_id = %report.run_id,
        rows = report.rows_written,
        files = report.files_written.len(),
        elapsed_ms = report.elapsed_ms as u64,
        "job succeeded"
    );

    Ok(report)
}
