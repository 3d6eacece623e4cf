pub mod columns;
pub mod config;
pub mod error;

pub use columns::ColumnSet;
pub use config::{
    AwsConfig, BookmarkOption, CatalogBackend, CatalogConfig, Compression, Config, JobConfig,
    ParquetConfig,
};
pub use error::ConfigError;
