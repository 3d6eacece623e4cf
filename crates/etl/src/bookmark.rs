//! Job Finalizer: commit a bookmark record for the run.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tablesync_storage::{StorageBackend, StorageLocation};

use crate::context::JobContext;
use crate::error::EtlError;

/// Progress record of the last successful run of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBookmark {
    pub job_name: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
    pub source_location: String,
    pub source_files: Vec<String>,
    pub destination_location: String,
    pub files_written: Vec<String>,
    pub rows_written: usize,
    /// `database.table` updated by the run.
    pub catalog_table: String,
}

/// Job names may contain `/`; flatten to a safe object key.
fn bookmark_key(job_name: &str) -> String {
    format!("{}.json", job_name.replace('/', "__"))
}

/// Bookmarks stored as `{job_name}.json` objects under one location.
pub struct BookmarkStore {
    backend: StorageBackend,
}

impl BookmarkStore {
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    pub fn open(ctx: &JobContext) -> Result<Self, EtlError> {
        let location = StorageLocation::parse(&ctx.config.job.bookmark_dir)?;
        let backend = StorageBackend::open_for_write(&location, &ctx.config.aws)?;
        Ok(Self::new(backend))
    }

    pub async fn load(&self, job_name: &str) -> Result<Option<JobBookmark>, EtlError> {
        match self.backend.get_opt(&bookmark_key(job_name)).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Store `bookmark`, replacing the previous one; returns its location.
    pub async fn save(&self, bookmark: &JobBookmark) -> Result<String, EtlError> {
        let key = bookmark_key(&bookmark.job_name);
        let json = serde_json::to_vec_pretty(bookmark)?;
        self.backend.put(&key, Bytes::from(json)).await?;
        Ok(self.backend.uri_for(&key))
    }
}

/// Commit `bookmark` when bookmarks are enabled. Returns where it was stored,
/// or `None` when bookmarks are disabled.
pub async fn commit(ctx: &JobContext, bookmark: &JobBookmark) -> Result<Option<String>, EtlError> {
    if !ctx.config.job.bookmark.is_enabled() {
        info!(job = %ctx.job_name, "bookmarks disabled, nothing to commit");
        return Ok(None);
    }

    let store = BookmarkStore::open(ctx)?;
    if let Some(previous) = store.load(&ctx.job_name).await? {
        info!(
            job = %ctx.job_name,
            previous_run = %previous.run_id,
            previous_commit = %previous.committed_at,
            "replacing previous bookmark"
        );
    }

    let location = store.save(bookmark).await?;
    info!(job = %ctx.job_name, run_id = %ctx.run_id, location = %location, "bookmark committed");
    Ok(Some(location))
}
