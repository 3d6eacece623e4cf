use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("storage location not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub(crate) fn invalid(location: &str, reason: impl Into<String>) -> Self {
        StorageError::InvalidLocation {
            location: location.to_string(),
            reason: reason.into(),
        }
    }
}
