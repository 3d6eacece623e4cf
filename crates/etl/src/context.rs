use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use tablesync_core::{ColumnSet, Config};
use tablesync_storage::{StorageBackend, StorageLocation};

use crate::error::EtlError;

/// Per-run execution context, created once at job start and handed to every stage.
pub struct JobContext {
    pub job_name: String,
    /// Unique per run; part of every output file name.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: Config,
    source: StorageBackend,
    destination: StorageBackend,
}

impl JobContext {
    /// Resolve the configured locations and open both storage backends.
    pub fn init(job_name: &str, config: Config) -> Result<Self, EtlError> {
        let source_location = StorageLocation::parse(&config.job.source_path)?;
        let destination_location = StorageLocation::parse(&config.job.destination_path)?;

        let source = StorageBackend::open(&source_location, &config.aws)?;
        let destination = StorageBackend::open_for_write(&destination_location, &config.aws)?;

        Ok(Self::with_backends(job_name, config, source, destination))
    }

    /// Build a context around already-opened backends.
    pub fn with_backends(
        job_name: &str,
        config: Config,
        source: StorageBackend,
        destination: StorageBackend,
    ) -> Self {
        let ctx = Self {
            job_name: job_name.to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            source,
            destination,
        };
        info!(
            job = %ctx.job_name,
            run_id = %ctx.run_id,
            source = %ctx.source.location(),
            destination = %ctx.destination.location(),
            "job context initialised"
        );
        ctx
    }

    pub fn source(&self) -> &StorageBackend {
        &self.source
    }

    pub fn destination(&self) -> &StorageBackend {
        &self.destination
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.config.job.columns
    }
}
