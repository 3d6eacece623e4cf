//! tablesync-job: one CSV to Parquet run with a catalog update.
//!
//! Diagnostics (input preview, column listing) go to stdout, logs to stderr.
//! Exits non-zero when any stage fails.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use tablesync_catalog::{CatalogStore, GlueCatalog, LocalCatalog};
use tablesync_core::config::load_dotenv;
use tablesync_core::{BookmarkOption, CatalogBackend, Compression, Config, ConfigError};
use tablesync_etl::{pipeline, JobContext};

// ── CLI ─────────────────────────────────────────────────────────────

/// Convert CSV input to Parquet and point a catalog table at it.
#[derive(Parser, Debug)]
#[command(name = "tablesync-job", version, about)]
struct Cli {
    /// Job identity supplied by the runner.
    #[arg(long = "job-name", alias = "JOB_NAME", env = "JOB_NAME")]
    job_name: String,

    /// Override SOURCE_PATH.
    #[arg(long)]
    source: Option<String>,

    /// Override DESTINATION_PATH.
    #[arg(long)]
    destination: Option<String>,

    /// Override CATALOG_DATABASE.
    #[arg(long)]
    database: Option<String>,

    /// Override CATALOG_TABLE.
    #[arg(long)]
    table: Option<String>,

    /// Override PARQUET_COMPRESSION (snappy, zstd, gzip, lz4, none).
    #[arg(long)]
    compression: Option<String>,

    /// Override CATALOG_BACKEND (glue, local).
    #[arg(long)]
    catalog_backend: Option<String>,

    /// Override JOB_BOOKMARK_OPTION.
    #[arg(long = "job-bookmark-option")]
    job_bookmark_option: Option<String>,

    /// Print the run report as JSON on success.
    #[arg(long)]
    report: bool,
}

impl Cli {
    /// Layer command-line overrides on top of the environment config.
    fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(source) = &self.source {
            config.job.source_path = source.clone();
        }
        if let Some(destination) = &self.destination {
            config.job.destination_path = destination.clone();
        }
        if let Some(database) = &self.database {
            config.catalog.database = database.clone();
        }
        if let Some(table) = &self.table {
            config.catalog.table = table.clone();
        }
        if let Some(codec) = &self.compression {
            config.parquet.compression = codec.parse::<Compression>()?;
        }
        if let Some(backend) = &self.catalog_backend {
            config.catalog.backend = backend.parse::<CatalogBackend>()?;
        }
        if let Some(option) = &self.job_bookmark_option {
            config.job.bookmark = option.parse::<BookmarkOption>()?;
        }
        Ok(())
    }
}

async fn open_catalog(config: &Config) -> Box<dyn CatalogStore> {
    match config.catalog.backend {
        CatalogBackend::Glue => Box::new(GlueCatalog::new(&config.aws).await),
        CatalogBackend::Local => Box::new(LocalCatalog::new(config.catalog.local_dir.clone())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    cli.apply(&mut config)
        .context("invalid command-line override")?;
    config.log_summary();

    let ctx = JobContext::init(&cli.job_name, config).context("failed to initialise job")?;
    let catalog = open_catalog(&ctx.config).await;

    match pipeline::run(&ctx, catalog.as_ref()).await {
        Ok(report) => {
            info!(
                job = %report.job_name,
                run_id = %report.run_id,
                rows = report.rows_written,
                "run complete"
            );
            if cli.report {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(e) => {
            error!(job = %ctx.job_name, run_id = %ctx.run_id, stage = %e.stage, error = %e.error, "run failed");
            Err(e).with_context(|| format!("job {} failed", ctx.job_name))
        }
    }
}
