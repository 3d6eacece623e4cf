use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StorageError;

/// Where a job reads from or writes to.
///
/// Accepts `s3://bucket/prefix/` (also `s3a://`), `file:///abs/path`, or a
/// plain filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageLocation {
    S3 { bucket: String, prefix: String },
    Local { root: PathBuf },
}

impl StorageLocation {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StorageError::invalid(raw, "empty location"));
        }

        if !trimmed.contains("://") {
            return Ok(StorageLocation::Local {
                root: PathBuf::from(trimmed),
            });
        }

        let url = Url::parse(trimmed).map_err(|e| StorageError::invalid(raw, e.to_string()))?;
        match url.scheme() {
            "s3" | "s3a" => {
                let bucket = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| StorageError::invalid(raw, "missing bucket name"))?;
                Ok(StorageLocation::S3 {
                    bucket: bucket.to_string(),
                    prefix: url.path().trim_matches('/').to_string(),
                })
            }
            "file" => {
                let root = url
                    .to_file_path()
                    .map_err(|_| StorageError::invalid(raw, "not an absolute file path"))?;
                Ok(StorageLocation::Local { root })
            }
            other => Err(StorageError::invalid(
                raw,
                format!("unsupported scheme {other:?} (expected s3 or file)"),
            )),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageLocation::S3 { .. })
    }

    /// Key prefix inside the store; empty for local roots.
    pub fn prefix(&self) -> &str {
        match self {
            StorageLocation::S3 { prefix, .. } => prefix,
            StorageLocation::Local { .. } => "",
        }
    }

    /// Location of an object below this one, in the same notation.
    pub fn join(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self {
            StorageLocation::S3 { bucket, prefix } if prefix.is_empty() => {
                format!("s3://{}/{}", bucket, key)
            }
            StorageLocation::S3 { bucket, prefix } => format!("s3://{}/{}/{}", bucket, prefix, key),
            StorageLocation::Local { root } => root.join(key).display().to_string(),
        }
    }
}

/// Directory-style rendering with a trailing slash, the form catalogs expect.
impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::S3 { bucket, prefix } if prefix.is_empty() => {
                write!(f, "s3://{}/", bucket)
            }
            StorageLocation::S3 { bucket, prefix } => write!(f, "s3://{}/{}/", bucket, prefix),
            StorageLocation::Local { root } => {
                let path = root.display().to_string();
                if path.ends_with('/') {
                    f.write_str(&path)
                } else {
                    write!(f, "{}/", path)
                }
            }
        }
    }
}

impl FromStr for StorageLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
