//! CSV to Parquet batch job with catalog synchronisation.
//!
//! A run reads every CSV object under the source location, keeps the
//! configured column set cast to text, writes Parquet under the destination
//! and points the catalog table at the new dataset.

pub mod bookmark;
pub mod context;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use bookmark::{BookmarkStore, JobBookmark};
pub use context::JobContext;
pub use error::{EtlError, Stage, StageError};
pub use pipeline::{run, JobReport};
pub use reader::{read_source, RecordSet, SourceFile};
pub use writer::{write_parquet, WrittenFile};
