use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CatalogError;
use crate::store::CatalogStore;
use crate::table::TableDefinition;

/// Filesystem-backed catalog for local runs and tests.
///
/// ```text
/// {base_dir}/
///   {database}/
///     {table}.json      <- TableDefinition, version_id bumped on every update
/// ```
pub struct LocalCatalog {
    base_dir: PathBuf,
}

impl LocalCatalog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn table_path(&self, database: &str, table: &str) -> PathBuf {
        self.base_dir.join(database).join(format!("{}.json", table))
    }

    /// Register a table definition, replacing any existing one.
    pub async fn create_table(
        &self,
        database: &str,
        definition: &TableDefinition,
    ) -> Result<(), CatalogError> {
        let mut definition = definition.clone();
        if definition.version_id.is_none() {
            definition.version_id = Some("1".to_string());
        }
        self.write(database, &definition).await
    }

    async fn read(&self, database: &str, table: &str) -> Result<TableDefinition, CatalogError> {
        let path = self.table_path(database, table);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::not_found(database, table));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    async fn write(&self, database: &str, definition: &TableDefinition) -> Result<(), CatalogError> {
        let path = self.table_path(database, &definition.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(definition)?;
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), "wrote table definition");
        Ok(())
    }
}

fn next_version(current: Option<&str>) -> String {
    current
        .and_then(|v| v.parse::<u64>().ok())
        .map(|v| v + 1)
        .unwrap_or(1)
        .to_string()
}

#[async_trait]
impl CatalogStore for LocalCatalog {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn get_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableDefinition, CatalogError> {
        self.read(database, table).await
    }

    async fn update_table(
        &self,
        database: &str,
        table: &TableDefinition,
        expected_version: Option<&str>,
    ) -> Result<(), CatalogError> {
        let stored = self.read(database, &table.name).await?;

        if let Some(expected) = expected_version {
            if stored.version_id.as_deref() != Some(expected) {
                return Err(CatalogError::conflict(
                    database,
                    &table.name,
                    format!(
                        "expected version {}, found {}",
                        expected,
                        stored.version_id.as_deref().unwrap_or("(none)")
                    ),
                ));
            }
        }

        let mut updated = table.clone();
        updated.version_id = Some(next_version(stored.version_id.as_deref()));
        self.write(database, &updated).await
    }
}
