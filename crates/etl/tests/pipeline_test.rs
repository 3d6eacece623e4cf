//! End-to-end runs against local directories and the local JSON catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::{Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::TempDir;

use tablesync_catalog::{
    CatalogColumn, CatalogStore, LocalCatalog, SerdeInfo, StorageDescriptor, TableDefinition,
    EXTERNAL_TABLE,
};
use tablesync_core::{
    AwsConfig, BookmarkOption, CatalogBackend, CatalogConfig, ColumnSet, Config, JobConfig,
    ParquetConfig,
};
use tablesync_etl::{pipeline, BookmarkStore, EtlError, JobContext, Stage};

const HEADER: &str =
    "alien_id,alien_name,species,home_planet,strength_level,speed_level,intelligence,notes";

struct Fixture {
    _tmp: TempDir,
    source: PathBuf,
    destination: PathBuf,
    catalog_dir: PathBuf,
    bookmark_dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("input");
        fs::create_dir_all(&source).unwrap();
        Self {
            source,
            destination: tmp.path().join("output"),
            catalog_dir: tmp.path().join("catalog"),
            bookmark_dir: tmp.path().join("bookmarks"),
            _tmp: tmp,
        }
    }

    fn add_csv(&self, name: &str, body: &str) {
        fs::write(self.source.join(name), body).unwrap();
    }

    fn config(&self, bookmark: BookmarkOption) -> Config {
        Config {
            profile: String::new(),
            job: JobConfig {
                source_path: self.source.display().to_string(),
                destination_path: self.destination.display().to_string(),
                columns: ColumnSet::standard(),
                preview_rows: 20,
                bookmark,
                bookmark_dir: self.bookmark_dir.display().to_string(),
            },
            parquet: ParquetConfig::default(),
            catalog: CatalogConfig {
                backend: CatalogBackend::Local,
                database: "jaladatax".into(),
                table: "ben10".into(),
                local_dir: self.catalog_dir.clone(),
                version_check: false,
            },
            aws: AwsConfig::default(),
        }
    }

    async fn seeded_catalog(&self) -> LocalCatalog {
        let catalog = LocalCatalog::new(&self.catalog_dir);
        catalog.create_table("jaladatax", &seeded_table()).await.unwrap();
        catalog
    }

    fn parquet_files(&self) -> Vec<PathBuf> {
        if !self.destination.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.destination)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map(|e| e == "parquet").unwrap_or(false))
            .collect();
        files.sort();
        files
    }
}

fn seeded_table() -> TableDefinition {
    let mut table = TableDefinition::new("ben10");
    table.table_type = Some(EXTERNAL_TABLE.into());
    table.description = Some("aliens".into());
    table.storage_descriptor = StorageDescriptor {
        columns: vec![CatalogColumn::new("legacy", "int")],
        location: Some("s3://old-location/".into()),
        input_format: Some("org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat".into()),
        output_format: Some(
            "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat".into(),
        ),
        serde_info: Some(SerdeInfo {
            name: None,
            serialization_library: Some(
                "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe".into(),
            ),
            parameters: BTreeMap::from([("serialization.format".into(), "1".into())]),
        }),
        ..Default::default()
    };
    table.parameters = BTreeMap::from([("classification".into(), "parquet".into())]);
    table
}

fn read_parquet(path: &Path) -> Vec<RecordBatch> {
    let data = Bytes::from(fs::read(path).unwrap());
    ParquetRecordBatchReaderBuilder::try_new(data)
        .unwrap()
        .build()
        .unwrap()
        .map(|b| b.unwrap())
        .collect()
}

fn text(batch: &RecordBatch, name: &str, row: usize) -> String {
    batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
        .value(row)
        .to_string()
}

#[tokio::test]
async fn single_row_becomes_seven_text_columns() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,amphibious\n"),
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let report = pipeline::run(&ctx, &catalog).await.unwrap();
    assert_eq!(report.rows_read, 1);
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.columns, ColumnSet::standard().names().to_vec());
    assert!(report.bookmark.is_none());

    let files = fx.parquet_files();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("part-00000-"));
    assert!(name.ends_with(".snappy.parquet"));

    let batches = read_parquet(&files[0]);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 7);
    assert!(batch
        .schema()
        .fields()
        .iter()
        .all(|f| f.data_type() == &DataType::Utf8));
    assert_eq!(text(batch, "alien_id", 0), "1");
    assert_eq!(text(batch, "alien_name", 0), "Ripjaw");
    assert_eq!(text(batch, "species", 0), "Piscciss");
    assert_eq!(text(batch, "home_planet", 0), "Piscciss Volann");
    assert_eq!(text(batch, "strength_level", 0), "8");
    assert_eq!(text(batch, "speed_level", 0), "9");
    assert_eq!(text(batch, "intelligence", 0), "5");
}

#[tokio::test]
async fn exact_column_set_input_is_written_as_text() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        "alien_id,alien_name,species,home_planet,strength_level,speed_level,intelligence\n\
         1,Ripjaw,Piscciss,Piscciss Volann,8,9,5\n",
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    pipeline::run(&ctx, &catalog).await.unwrap();

    let files = fx.parquet_files();
    assert_eq!(files.len(), 1);
    let batches = read_parquet(&files[0]);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);

    let names: Vec<String> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names, ColumnSet::standard().names().to_vec());

    let row: Vec<String> = names.iter().map(|name| text(batch, name, 0)).collect();
    assert_eq!(
        row,
        vec!["1", "Ripjaw", "Piscciss", "Piscciss Volann", "8", "9", "5"]
    );
}

#[tokio::test]
async fn extra_columns_are_not_written() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!(
            "{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,fish\n\
             2,Heatblast,Pyronite,Pyros,9,6,6,hot\n"
        ),
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    pipeline::run(&ctx, &catalog).await.unwrap();

    let batches = read_parquet(&fx.parquet_files()[0]);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 2);
    assert!(batch.column_by_name("notes").is_none());

    let stored = catalog.get_table("jaladatax", "ben10").await.unwrap();
    assert!(!stored.column_names().any(|c| c == "notes"));
}

#[tokio::test]
async fn missing_column_fails_before_writing() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        "alien_id,alien_name,species,home_planet,strength_level,intelligence\n\
         1,Ripjaw,Piscciss,Piscciss Volann,8,5\n",
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let err = pipeline::run(&ctx, &catalog).await.unwrap_err();
    assert_eq!(err.stage, Stage::Normalize);
    match &err.error {
        EtlError::MissingColumn { column } => assert_eq!(column, "speed_level"),
        other => panic!("unexpected error: {other}"),
    }

    assert!(fx.parquet_files().is_empty());
    let stored = catalog.get_table("jaladatax", "ben10").await.unwrap();
    assert_eq!(stored, seeded_with_version(&stored));
}

/// The seeded table with the version token the catalog assigned.
fn seeded_with_version(stored: &TableDefinition) -> TableDefinition {
    let mut expected = seeded_table();
    expected.version_id = stored.version_id.clone();
    expected
}

#[tokio::test]
async fn catalog_keeps_formats_and_points_at_destination() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,\n"),
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let report = pipeline::run(&ctx, &catalog).await.unwrap();
    let stored = catalog.get_table("jaladatax", "ben10").await.unwrap();
    let original = seeded_table();

    assert_eq!(
        stored.storage_descriptor.location.as_deref(),
        Some(report.catalog_location.as_str())
    );
    assert_eq!(report.catalog_location, ctx.destination().location().to_string());
    assert!(report.catalog_location.ends_with('/'));

    assert_eq!(
        stored.column_names().collect::<Vec<_>>(),
        ColumnSet::standard().names().iter().map(String::as_str).collect::<Vec<_>>()
    );
    assert!(stored
        .storage_descriptor
        .columns
        .iter()
        .all(|c| c.data_type.as_deref() == Some("string")));

    assert_eq!(stored.storage_descriptor.serde_info, original.storage_descriptor.serde_info);
    assert_eq!(stored.storage_descriptor.input_format, original.storage_descriptor.input_format);
    assert_eq!(stored.storage_descriptor.output_format, original.storage_descriptor.output_format);
    assert_eq!(stored.parameters, original.parameters);
    assert_eq!(stored.description, original.description);
    assert!(stored.is_external());
}

#[tokio::test]
async fn reruns_append_files_and_leave_catalog_stable() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,x\n"),
    );
    let catalog = fx.seeded_catalog().await;

    let first = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();
    pipeline::run(&first, &catalog).await.unwrap();
    let mut after_first = catalog.get_table("jaladatax", "ben10").await.unwrap();

    let second = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();
    pipeline::run(&second, &catalog).await.unwrap();
    let mut after_second = catalog.get_table("jaladatax", "ben10").await.unwrap();

    after_first.version_id = None;
    after_second.version_id = None;
    assert_eq!(after_first, after_second);

    // Output names are unique per run.
    assert_eq!(fx.parquet_files().len(), 2);
}

#[tokio::test]
async fn files_without_data_are_skipped() {
    let fx = Fixture::new();
    fx.add_csv("_SUCCESS", "");
    fx.add_csv(".hidden.csv", "garbage without the right header\n");
    fx.add_csv(
        "part-1.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,a\n"),
    );
    fx.add_csv(
        "part-2.csv",
        &format!("{HEADER}\n2,Upgrade,Galvanic Mechamorph,Galvan B,6,7,10,b\n"),
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let report = pipeline::run(&ctx, &catalog).await.unwrap();
    assert_eq!(report.source_files, vec!["part-1.csv", "part-2.csv"]);
    assert_eq!(report.rows_written, 2);
}

#[tokio::test]
async fn empty_source_fails_in_read_stage() {
    let fx = Fixture::new();
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let err = pipeline::run(&ctx, &catalog).await.unwrap_err();
    assert_eq!(err.stage, Stage::Read);
    assert!(matches!(err.error, EtlError::SourceEmpty(_)));
}

#[tokio::test]
async fn missing_table_fails_in_catalog_stage() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,x\n"),
    );
    let catalog = LocalCatalog::new(&fx.catalog_dir);
    let ctx = JobContext::init("csv-to-parquet", fx.config(BookmarkOption::Disable)).unwrap();

    let err = pipeline::run(&ctx, &catalog).await.unwrap_err();
    assert_eq!(err.stage, Stage::Catalog);
    // Data is written before the catalog is touched.
    assert_eq!(fx.parquet_files().len(), 1);
}

#[tokio::test]
async fn bookmark_committed_when_enabled() {
    let fx = Fixture::new();
    fx.add_csv(
        "aliens.csv",
        &format!("{HEADER}\n1,Ripjaw,Piscciss,Piscciss Volann,8,9,5,x\n"),
    );
    let catalog = fx.seeded_catalog().await;
    let ctx = JobContext::init("nightly/aliens", fx.config(BookmarkOption::Enable)).unwrap();

    let report = pipeline::run(&ctx, &catalog).await.unwrap();
    assert!(report.bookmark.is_some());

    let store = BookmarkStore::open(&ctx).unwrap();
    let bookmark = store.load("nightly/aliens").await.unwrap().unwrap();
    assert_eq!(bookmark.run_id, ctx.run_id);
    assert_eq!(bookmark.rows_written, 1);
    assert_eq!(bookmark.source_files, vec!["aliens.csv"]);
    assert_eq!(bookmark.catalog_table, "jaladatax.ben10");
    assert_eq!(bookmark.files_written.len(), 1);
}
