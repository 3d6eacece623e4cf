//! Metadata catalog access: table model, store backends and the update merge.

pub mod error;
pub mod glue;
pub mod local;
pub mod store;
pub mod table;
pub mod update;

pub use error::CatalogError;
pub use glue::GlueCatalog;
pub use local::LocalCatalog;
pub use store::CatalogStore;
pub use table::{
    CatalogColumn, SchemaId, SchemaReference, SerdeInfo, SkewedInfo, SortColumn, StorageDescriptor,
    TableDefinition, EXTERNAL_TABLE, STRING_TYPE,
};
pub use update::{merge_table, string_columns, CatalogUpdate, CatalogUpdater};
