use std::fmt;

use arrow::error::ArrowError;
use thiserror::Error;

use tablesync_catalog::CatalogError;
use tablesync_core::ConfigError;
use tablesync_storage::StorageError;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("no input files under {0}")]
    SourceEmpty(String),

    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: ArrowError,
    },

    #[error("column {column:?} is missing from the input")]
    MissingColumn { column: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The five job stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Normalize,
    Write,
    Catalog,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Normalize => "normalize",
            Stage::Write => "write",
            Stage::Catalog => "catalog",
            Stage::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// A fatal error tagged with the stage it aborted.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: EtlError,
}

impl StageError {
    pub fn new(stage: Stage, error: impl Into<EtlError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}
