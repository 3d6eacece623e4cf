use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info};

use tablesync_core::config::AwsConfig;

use crate::error::StorageError;
use crate::location::StorageLocation;

/// An object discovered under a [`StorageBackend`] root.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Key relative to the backend root (no leading slash).
    pub key: String,
    pub size: usize,
    pub last_modified: DateTime<Utc>,
}

impl ObjectEntry {
    /// Hidden objects (`_SUCCESS`, `.crc`, `_temporary/...`) are bookkeeping, not data.
    pub fn is_hidden(&self) -> bool {
        self.key
            .split('/')
            .any(|part| part.starts_with('_') || part.starts_with('.'))
    }
}

/// A storage location bound to an `object_store` implementation.
///
/// All keys passed in and returned are relative to the location, so the
/// same code works against a local directory and an S3 prefix.
pub struct StorageBackend {
    store: Arc<dyn ObjectStore>,
    location: StorageLocation,
}

impl StorageBackend {
    /// Open an existing location for reading. A missing local root is an error.
    pub fn open(location: &StorageLocation, aws: &AwsConfig) -> Result<Self, StorageError> {
        match location {
            StorageLocation::Local { root } => {
                if !root.is_dir() {
                    return Err(StorageError::NotFound(root.display().to_string()));
                }
                Self::local(location)
            }
            StorageLocation::S3 { .. } => Self::s3(location, aws),
        }
    }

    /// Open a location for writing, creating a local root when needed.
    pub fn open_for_write(
        location: &StorageLocation,
        aws: &AwsConfig,
    ) -> Result<Self, StorageError> {
        if let StorageLocation::Local { root } = location {
            std::fs::create_dir_all(root)?;
        }
        Self::open(location, aws)
    }

    /// Wrap an already-built store (tests, in-memory stores).
    pub fn with_store(store: Arc<dyn ObjectStore>, location: StorageLocation) -> Self {
        Self { store, location }
    }

    fn local(location: &StorageLocation) -> Result<Self, StorageError> {
        let StorageLocation::Local { root } = location else {
            return Err(StorageError::invalid(&location.to_string(), "not a local location"));
        };
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.clone());
        let store = LocalFileSystem::new_with_prefix(&canonical)?;
        info!("Storage: local backend at {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            location: location.clone(),
        })
    }

    fn s3(location: &StorageLocation, aws: &AwsConfig) -> Result<Self, StorageError> {
        let StorageLocation::S3 { bucket, prefix } = location else {
            return Err(StorageError::invalid(&location.to_string(), "not an S3 location"));
        };

        let mut builder = AmazonS3Builder::from_env()
            .with_region(&aws.region)
            .with_bucket_name(bucket);

        if let Some(ref key) = aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(ref token) = aws.session_token {
            builder = builder.with_token(token);
        }
        if let Some(endpoint) = aws.endpoint_with_scheme() {
            builder = builder
                .with_endpoint(&endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.build()?;

        info!(
            "Storage: S3 backend s3://{}/{} (region: {})",
            bucket, prefix, aws.region
        );

        Ok(Self {
            store: Arc::new(store),
            location: location.clone(),
        })
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn is_remote(&self) -> bool {
        self.location.is_remote()
    }

    /// Full object-store path for a key relative to this location.
    fn path_for(&self, key: &str) -> Path {
        let key = key.trim_start_matches('/');
        let prefix = self.location.prefix();
        if prefix.is_empty() {
            Path::from(key)
        } else {
            Path::from(format!("{}/{}", prefix, key))
        }
    }

    /// Key relative to this location for a full object-store path.
    fn key_for(&self, path: &Path) -> String {
        let full = path.to_string();
        let prefix = self.location.prefix();
        if prefix.is_empty() {
            return full;
        }
        full.strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .unwrap_or(full)
    }

    /// List every object under the location, sorted by key.
    pub async fn list(&self) -> Result<Vec<ObjectEntry>, StorageError> {
        let prefix = self.location.prefix();
        let list_path = (!prefix.is_empty()).then(|| Path::from(prefix));
        let mut stream = self.store.list(list_path.as_ref());

        let mut entries = Vec::new();
        while let Some(meta) = stream.try_next().await? {
            entries.push(ObjectEntry {
                key: self.key_for(&meta.location),
                size: meta.size,
                last_modified: meta.last_modified,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(location = %self.location, objects = entries.len(), "listed objects");
        Ok(entries)
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let result = self.store.get(&self.path_for(key)).await?;
        Ok(result.bytes().await?)
    }

    /// Fetch an object, mapping "not found" to `None`.
    pub async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        match self.get(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StorageError::ObjectStore(object_store::Error::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write an object, replacing any object with the same key.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let len = data.len();
        self.store.put(&self.path_for(key), data.into()).await?;
        debug!(location = %self.location, key, bytes = len, "wrote object");
        Ok(())
    }

    /// Location string of an object below this backend.
    pub fn uri_for(&self, key: &str) -> String {
        self.location.join(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_objects() {
        let entry = |key: &str| ObjectEntry {
            key: key.to_string(),
            size: 1,
            last_modified: Utc::now(),
        };
        assert!(entry("_SUCCESS").is_hidden());
        assert!(entry("_temporary/0/part.csv").is_hidden());
        assert!(entry(".part-0.csv.crc").is_hidden());
        assert!(!entry("2025/aliens.csv").is_hidden());
    }

    #[test]
    fn missing_local_root_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let loc = StorageLocation::Local {
            root: tmp.path().join("does-not-exist"),
        };
        let err = StorageBackend::open(&loc, &AwsConfig::default()).err().unwrap();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn local_put_list_get() {
        let tmp = tempfile::tempdir().unwrap();
        let loc = StorageLocation::Local {
            root: tmp.path().join("out"),
        };
        let backend = StorageBackend::open_for_write(&loc, &AwsConfig::default()).unwrap();
        assert!(!backend.is_remote());

        backend.put("b/two.txt", Bytes::from_static(b"2")).await.unwrap();
        backend.put("a.txt", Bytes::from_static(b"one")).await.unwrap();

        let keys: Vec<String> = backend.list().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a.txt".to_string(), "b/two.txt".to_string()]);

        assert_eq!(backend.get("a.txt").await.unwrap(), Bytes::from_static(b"one"));
        assert!(backend.get_opt("missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefixed_store_keys_are_relative() {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let backend = StorageBackend::with_store(
            store,
            StorageLocation::S3 {
                bucket: "lake".into(),
                prefix: "curated/aliens".into(),
            },
        );

        backend.put("part-00000.parquet", Bytes::from_static(b"x")).await.unwrap();
        let entries = backend.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "part-00000.parquet");
        assert_eq!(
            backend.uri_for(&entries[0].key),
            "s3://lake/curated/aliens/part-00000.parquet"
        );
    }
}
