use thiserror::Error;

/// Errors produced by [`CatalogStore`](crate::CatalogStore) implementations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("table {database}.{table} not found")]
    TableNotFound { database: String, table: String },

    #[error("table {database}.{table} was modified concurrently: {reason}")]
    Conflict {
        database: String,
        table: String,
        reason: String,
    },

    #[error("invalid table definition: {0}")]
    InvalidDefinition(String),

    #[error("catalog service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(database: &str, table: &str) -> Self {
        CatalogError::TableNotFound {
            database: database.to_string(),
            table: table.to_string(),
        }
    }

    pub fn conflict(database: &str, table: &str, reason: impl Into<String>) -> Self {
        CatalogError::Conflict {
            database: database.to_string(),
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}
