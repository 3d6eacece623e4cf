//! Point a catalog table at a freshly written dataset.

use tracing::info;

use crate::error::CatalogError;
use crate::store::CatalogStore;
use crate::table::{CatalogColumn, TableDefinition, EXTERNAL_TABLE, STRING_TYPE};

/// Label every column as `string`.
///
/// The writer casts everything to text, so the mapping is fixed rather than
/// inferred from data.
pub fn string_columns<'a, I>(names: I) -> Vec<CatalogColumn>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| CatalogColumn::new(name, STRING_TYPE))
        .collect()
}

/// Copy `existing`, replacing only the column list and the location.
///
/// Formats, serde settings, bucketing, partition keys and parameters carry
/// over untouched. The name is kept and the type is always `EXTERNAL_TABLE`.
pub fn merge_table(
    existing: &TableDefinition,
    columns: Vec<CatalogColumn>,
    location: &str,
) -> TableDefinition {
    let mut updated = existing.clone();
    updated.storage_descriptor.columns = columns;
    updated.storage_descriptor.location = Some(location.to_string());
    updated.table_type = Some(EXTERNAL_TABLE.to_string());
    updated
}

/// Result of a catalog update: the definition before and after.
#[derive(Debug, Clone)]
pub struct CatalogUpdate {
    pub previous: TableDefinition,
    pub updated: TableDefinition,
}

/// Read-modify-write of one table definition.
pub struct CatalogUpdater<'a> {
    store: &'a dyn CatalogStore,
    database: String,
    table: String,
    version_check: bool,
}

impl<'a> CatalogUpdater<'a> {
    pub fn new(store: &'a dyn CatalogStore, database: &str, table: &str) -> Self {
        Self {
            store,
            database: database.to_string(),
            table: table.to_string(),
            version_check: false,
        }
    }

    /// Send the fetched version with the update so a concurrent edit fails.
    pub fn with_version_check(mut self, enabled: bool) -> Self {
        self.version_check = enabled;
        self
    }

    pub async fn apply(
        &self,
        columns: Vec<CatalogColumn>,
        location: &str,
    ) -> Result<CatalogUpdate, CatalogError> {
        let previous = self.store.get_table(&self.database, &self.table).await?;
        let updated = merge_table(&previous, columns, location);

        let expected_version = if self.version_check {
            previous.version_id.as_deref()
        } else {
            None
        };

        self.store
            .update_table(&self.database, &updated, expected_version)
            .await?;

        info!(
            catalog = self.store.kind(),
            database = %self.database,
            table = %self.table,
            columns = updated.storage_descriptor.columns.len(),
            location = %location,
            "catalog table updated"
        );

        Ok(CatalogUpdate { previous, updated })
    }
}
