//! Run configuration.
//!
//! # Design
//! `SyncConfig` is the validated form every trigger hands to the
//! orchestrator. Parsing flags and environment variables is the runner's job;
//! this module only checks the values and turns the store connection string
//! into a concrete backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::client::DEFAULT_BASE_URL;
use crate::detail::FieldExclusion;
use crate::error::ConfigError;
use crate::query::ListingQuery;
use crate::store::{FsStore, MemoryStore, RecordStore};
use crate::transport::{DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT};

pub const DEFAULT_CONTAINER: &str = "subsidies";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Where persisted records live.
///
/// `file://<dir>` or a bare path selects the filesystem store; `memory:`
/// selects a process-local store that vanishes on exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConnection {
    Filesystem(PathBuf),
    Memory,
}

impl StoreConnection {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::Missing("STORAGE_CONNECTION_STRING"));
        }
        if raw == "memory:" || raw == "memory://" {
            return Ok(StoreConnection::Memory);
        }
        if let Some(path) = raw.strip_prefix("file://") {
            if path.is_empty() {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_CONNECTION_STRING",
                    reason: "file:// connection needs a directory".to_string(),
                });
            }
            return Ok(StoreConnection::Filesystem(PathBuf::from(path)));
        }
        match raw.split_once("://") {
            Some((scheme, _)) => Err(ConfigError::UnsupportedConnection(scheme.to_string())),
            None => Ok(StoreConnection::Filesystem(PathBuf::from(raw))),
        }
    }

    pub fn open(&self) -> Arc<dyn RecordStore> {
        match self {
            StoreConnection::Filesystem(root) => Arc::new(FsStore::new(root.clone())),
            StoreConnection::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub query: ListingQuery,
    pub connection: StoreConnection,
    pub container: String,
    pub exclusion: FieldExclusion,
    /// Bounds how many new items one run processes.
    pub max_items: Option<usize>,
    /// Count records without attachments as skipped instead of saving them.
    pub skip_empty: bool,
    pub concurrency: usize,
    pub request_timeout: Duration,
    /// Responses larger than this fail as transport errors.
    pub max_body_bytes: u64,
}

impl SyncConfig {
    /// Defaults for everything except the store connection, which has none.
    pub fn new(connection: StoreConnection) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query: ListingQuery::default(),
            connection,
            container: DEFAULT_CONTAINER.to_string(),
            exclusion: FieldExclusion::default(),
            max_items: None,
            skip_empty: false,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Build from the raw connection setting, failing when it is absent.
    pub fn from_connection(raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = raw.ok_or(ConfigError::Missing("STORAGE_CONNECTION_STRING"))?;
        Ok(Self::new(StoreConnection::parse(raw)?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let container = self.container.as_str();
        if container.trim().is_empty() {
            return Err(ConfigError::Missing("BLOB_CONTAINER_NAME"));
        }
        if container != container.trim()
            || container.starts_with('.')
            || container.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid {
                name: "BLOB_CONTAINER_NAME",
                reason: format!("{container:?} is not a valid container name"),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::Invalid {
                name: "max_items",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: "max_body_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "base_url",
                reason: format!("{:?} is not an http(s) URL", self.base_url),
            });
        }
        self.query.validate()
    }
}
