use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::columns::ColumnSet;
use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

/// Parse a profiled env var through `FromStr`, reporting the key on failure.
fn profiled_env_parse<T>(profile: &str, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    match profiled_env_opt(profile, key) {
        Some(v) => v.parse().map_err(|e| match e {
            ConfigError::Invalid { value, reason, .. } => ConfigError::Invalid {
                key: key.to_string(),
                value,
                reason,
            },
            other => other,
        }),
        None => Ok(default),
    }
}

pub const DEFAULT_SOURCE_PATH: &str = "s3://input-csv-data-06-04-2025/";
pub const DEFAULT_DESTINATION_PATH: &str = "s3://output-parquet-data-06-04-2025/";
pub const DEFAULT_DATABASE: &str = "jaladatax";
pub const DEFAULT_TABLE: &str = "ben10";

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub job: JobConfig,
    pub parquet: ParquetConfig,
    pub catalog: CatalogConfig,
    pub aws: AwsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TABLESYNC_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("TABLESYNC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Ok(Self {
            profile: p.to_string(),
            job: JobConfig::from_env_profiled(p)?,
            parquet: ParquetConfig::from_env_profiled(p)?,
            catalog: CatalogConfig::from_env_profiled(p)?,
            aws: AwsConfig::from_env_profiled(p),
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  source:      {}", self.job.source_path);
        tracing::info!("  destination: {}", self.job.destination_path);
        tracing::info!("  columns:     {}", self.job.columns);
        tracing::info!(
            "  parquet:     compression={}, rows_per_file={}",
            self.parquet.compression,
            self.parquet.rows_per_file
        );
        tracing::info!(
            "  catalog:     backend={}, table={}.{}, version_check={}",
            self.catalog.backend,
            self.catalog.database,
            self.catalog.table,
            self.catalog.version_check
        );
        tracing::info!(
            "  bookmark:    {} ({})",
            self.job.bookmark,
            self.job.bookmark_dir
        );
        tracing::info!(
            "  aws:         region={}, static_credentials={}, endpoint={}",
            self.aws.region,
            self.aws.has_static_credentials(),
            self.aws.endpoint_url.as_deref().unwrap_or("(default)")
        );
    }

    /// Return a redacted view safe for logging as JSON (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "job": {
                "source_path": self.job.source_path,
                "destination_path": self.job.destination_path,
                "columns": self.job.columns,
                "preview_rows": self.job.preview_rows,
                "bookmark": self.job.bookmark.to_string(),
                "bookmark_dir": self.job.bookmark_dir,
            },
            "parquet": {
                "compression": self.parquet.compression.to_string(),
                "rows_per_file": self.parquet.rows_per_file,
            },
            "catalog": {
                "backend": self.catalog.backend.to_string(),
                "database": self.catalog.database,
                "table": self.catalog.table,
                "local_dir": self.catalog.local_dir,
                "version_check": self.catalog.version_check,
            },
            "aws": {
                "region": self.aws.region,
                "endpoint_url": self.aws.endpoint_url,
                "static_credentials": self.aws.has_static_credentials(),
            },
        })
    }
}

// ── Job ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Storage location of the CSV input (`s3://`, `file://` or a plain path).
    pub source_path: String,
    /// Storage location receiving the Parquet output.
    pub destination_path: String,
    pub columns: ColumnSet,
    /// Rows shown in the input preview printed to stdout.
    pub preview_rows: usize,
    pub bookmark: BookmarkOption,
    /// Storage location holding `{job_name}.json` bookmark records.
    pub bookmark_dir: String,
}

impl JobConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let columns = match profiled_env_opt(p, "JOB_COLUMNS") {
            Some(list) => ColumnSet::parse_list(&list)?,
            None => ColumnSet::standard(),
        };
        Ok(Self {
            source_path: profiled_env_or(p, "SOURCE_PATH", DEFAULT_SOURCE_PATH),
            destination_path: profiled_env_or(p, "DESTINATION_PATH", DEFAULT_DESTINATION_PATH),
            columns,
            preview_rows: profiled_env_usize(p, "PREVIEW_ROWS", 20),
            bookmark: profiled_env_parse(p, "JOB_BOOKMARK_OPTION", BookmarkOption::Disable)?,
            bookmark_dir: profiled_env_or(p, "BOOKMARK_DIR", "data/bookmarks"),
        })
    }
}

/// Mirrors the `--job-bookmark-option` values of managed ETL runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookmarkOption {
    Enable,
    Disable,
}

impl BookmarkOption {
    pub fn is_enabled(self) -> bool {
        self == BookmarkOption::Enable
    }
}

impl FromStr for BookmarkOption {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "job-bookmark-enable" | "enable" | "true" | "1" => Ok(BookmarkOption::Enable),
            "job-bookmark-disable" | "disable" | "false" | "0" => Ok(BookmarkOption::Disable),
            _ => Err(ConfigError::invalid(
                "JOB_BOOKMARK_OPTION",
                s,
                "expected job-bookmark-enable or job-bookmark-disable",
            )),
        }
    }
}

impl fmt::Display for BookmarkOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkOption::Enable => write!(f, "job-bookmark-enable"),
            BookmarkOption::Disable => write!(f, "job-bookmark-disable"),
        }
    }
}

// ── Parquet ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetConfig {
    pub compression: Compression,
    /// Upper bound on rows per output file; larger outputs are split.
    pub rows_per_file: usize,
}

impl ParquetConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let rows_per_file = profiled_env_usize(p, "PARQUET_ROWS_PER_FILE", 1_000_000);
        if rows_per_file == 0 {
            return Err(ConfigError::invalid(
                "PARQUET_ROWS_PER_FILE",
                "0",
                "must be at least 1",
            ));
        }
        Ok(Self {
            compression: profiled_env_parse(p, "PARQUET_COMPRESSION", Compression::Snappy)?,
            rows_per_file,
        })
    }
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Snappy,
            rows_per_file: 1_000_000,
        }
    }
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Snappy,
    Zstd,
    Gzip,
    Lz4,
    None,
}

impl Compression {
    /// Infix used in output file names (`part-00000-<run>.snappy.parquet`).
    pub fn file_infix(self) -> Option<&'static str> {
        match self {
            Compression::Snappy => Some("snappy"),
            Compression::Zstd => Some("zstd"),
            Compression::Gzip => Some("gz"),
            Compression::Lz4 => Some("lz4"),
            Compression::None => None,
        }
    }
}

impl FromStr for Compression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "gzip" => Ok(Compression::Gzip),
            "lz4" => Ok(Compression::Lz4),
            "none" | "uncompressed" => Ok(Compression::None),
            _ => Err(ConfigError::invalid(
                "PARQUET_COMPRESSION",
                s,
                "expected snappy, zstd, gzip, lz4 or none",
            )),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::Snappy => "snappy",
            Compression::Zstd => "zstd",
            Compression::Gzip => "gzip",
            Compression::Lz4 => "lz4",
            Compression::None => "none",
        };
        f.write_str(name)
    }
}

// ── Catalog ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    pub database: String,
    pub table: String,
    /// Root directory of the local JSON catalog.
    pub local_dir: PathBuf,
    /// Send the fetched table version with the update so concurrent edits conflict.
    pub version_check: bool,
}

impl CatalogConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            backend: profiled_env_parse(p, "CATALOG_BACKEND", CatalogBackend::Glue)?,
            database: profiled_env_or(p, "CATALOG_DATABASE", DEFAULT_DATABASE),
            table: profiled_env_or(p, "CATALOG_TABLE", DEFAULT_TABLE),
            local_dir: PathBuf::from(profiled_env_or(p, "CATALOG_DIR", "data/catalog")),
            version_check: profiled_env_bool(p, "CATALOG_VERSION_CHECK", false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    Glue,
    Local,
}

impl FromStr for CatalogBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "glue" => Ok(CatalogBackend::Glue),
            "local" | "file" => Ok(CatalogBackend::Local),
            _ => Err(ConfigError::invalid("CATALOG_BACKEND", s, "expected glue or local")),
        }
    }
}

impl fmt::Display for CatalogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogBackend::Glue => write!(f, "glue"),
            CatalogBackend::Local => write!(f, "local"),
        }
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// S3-compatible endpoint override (MinIO, LocalStack).
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "ap-southeast-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    /// True when an explicit key pair is configured; otherwise the SDK's
    /// default credential chain applies.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Endpoint with a scheme, as the S3 and Glue clients require absolute URLs.
    pub fn endpoint_with_scheme(&self) -> Option<String> {
        let endpoint = self.endpoint_url.as_deref()?;
        if endpoint.is_empty() {
            return None;
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Some(endpoint.to_string())
        } else {
            Some(format!("https://{}", endpoint))
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "ap-southeast-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        let keys = [
            "TABLESYNC_PROFILE",
            "SOURCE_PATH",
            "DESTINATION_PATH",
            "JOB_COLUMNS",
            "PREVIEW_ROWS",
            "JOB_BOOKMARK_OPTION",
            "BOOKMARK_DIR",
            "PARQUET_COMPRESSION",
            "PARQUET_ROWS_PER_FILE",
            "CATALOG_BACKEND",
            "CATALOG_DATABASE",
            "CATALOG_TABLE",
            "CATALOG_DIR",
            "CATALOG_VERSION_CHECK",
            "AWS_REGION",
            "AWS_ENDPOINT_URL",
            "TEST_CATALOG_TABLE",
            "TEST_SOURCE_PATH",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("").unwrap();

        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.job.source_path, DEFAULT_SOURCE_PATH);
        assert_eq!(cfg.job.destination_path, DEFAULT_DESTINATION_PATH);
        assert_eq!(cfg.job.columns, ColumnSet::standard());
        assert_eq!(cfg.job.preview_rows, 20);
        assert_eq!(cfg.job.bookmark, BookmarkOption::Disable);
        assert_eq!(cfg.parquet.compression, Compression::Snappy);
        assert_eq!(cfg.catalog.backend, CatalogBackend::Glue);
        assert_eq!(cfg.catalog.database, "jaladatax");
        assert_eq!(cfg.catalog.table, "ben10");
        assert!(!cfg.catalog.version_check);
    }

    #[test]
    fn profiled_env_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("CATALOG_TABLE", "base_table");
        env::set_var("TEST_CATALOG_TABLE", "test_table");
        env::set_var("SOURCE_PATH", "/tmp/in");

        let cfg = Config::for_profile("test").unwrap();
        assert_eq!(cfg.profile, "TEST");
        assert_eq!(cfg.catalog.table, "test_table");
        // No TEST_SOURCE_PATH, falls back to the unprefixed key.
        assert_eq!(cfg.job.source_path, "/tmp/in");

        clear_env();
    }

    #[test]
    fn parses_enums_and_columns() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PARQUET_COMPRESSION", "ZSTD");
        env::set_var("CATALOG_BACKEND", "local");
        env::set_var("JOB_BOOKMARK_OPTION", "job-bookmark-enable");
        env::set_var("JOB_COLUMNS", "id,name");
        env::set_var("CATALOG_VERSION_CHECK", "1");

        let cfg = Config::for_profile("").unwrap();
        assert_eq!(cfg.parquet.compression, Compression::Zstd);
        assert_eq!(cfg.catalog.backend, CatalogBackend::Local);
        assert!(cfg.job.bookmark.is_enabled());
        assert_eq!(cfg.job.columns.names(), &["id", "name"]);
        assert!(cfg.catalog.version_check);

        clear_env();
    }

    #[test]
    fn invalid_codec_names_the_key() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PARQUET_COMPRESSION", "brotli-9000");
        let err = Config::for_profile("").unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "PARQUET_COMPRESSION");
                assert_eq!(value, "brotli-9000");
            }
            other => panic!("unexpected error: {other}"),
        }

        clear_env();
    }

    #[test]
    fn zero_rows_per_file_rejected() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PARQUET_ROWS_PER_FILE", "0");
        assert!(Config::for_profile("").is_err());

        clear_env();
    }

    #[test]
    fn endpoint_gets_scheme() {
        let mut aws = AwsConfig::default();
        assert_eq!(aws.endpoint_with_scheme(), None);
        aws.endpoint_url = Some("localhost:4566".into());
        assert_eq!(aws.endpoint_with_scheme().as_deref(), Some("https://localhost:4566"));
        aws.endpoint_url = Some("http://minio:9000".into());
        assert_eq!(aws.endpoint_with_scheme().as_deref(), Some("http://minio:9000"));
    }

    #[test]
    fn compression_file_infix() {
        assert_eq!(Compression::Snappy.file_infix(), Some("snappy"));
        assert_eq!(Compression::None.file_infix(), None);
        assert_eq!("uncompressed".parse::<Compression>().unwrap(), Compression::None);
    }

    #[test]
    fn redacted_summary_has_no_secrets() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let mut cfg = Config::for_profile("").unwrap();
        cfg.aws.secret_access_key = Some("super-secret".into());
        let json = cfg.redacted_summary().to_string();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("ben10"));
    }
}
