use async_trait::async_trait;

use crate::error::CatalogError;
use crate::table::TableDefinition;

/// A metadata catalog holding table definitions grouped by database.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Short backend label used in logs (`glue`, `local`).
    fn kind(&self) -> &'static str;

    /// Fetch the current definition of `database.table`.
    async fn get_table(&self, database: &str, table: &str)
        -> Result<TableDefinition, CatalogError>;

    /// Replace the definition of an existing table.
    ///
    /// When `expected_version` is set, the update only applies if the stored
    /// version still matches; otherwise [`CatalogError::Conflict`] is returned.
    async fn update_table(
        &self,
        database: &str,
        table: &TableDefinition,
        expected_version: Option<&str>,
    ) -> Result<(), CatalogError>;
}
