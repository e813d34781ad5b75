//! Error types for the subsidy ingestion pipeline.
//!
//! # Design
//! Each concern gets its own enum: `ApiError` for the upstream HTTP API,
//! `StoreError` for the record store, `ConfigError` for run configuration.
//! `SyncError` is the run-level error and only ever carries failures that
//! abort a whole run; per-item failures are counted, not raised.

use thiserror::Error;

/// Errors returned by the upstream API clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout,
    /// truncated body).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body was not the expected JSON envelope.
    #[error("decode error: {0}")]
    Decode(String),

    /// The detail envelope came back with no record for the requested ID.
    #[error("no detail record returned for {0}")]
    NotFound(String),
}

impl ApiError {
    /// True for network-level failures and non-success statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::HttpStatus { .. })
    }
}

/// Errors returned by `RecordStore` implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("container {0} does not exist")]
    ContainerNotFound(String),

    #[error("object {container}/{key} already exists")]
    AlreadyExists { container: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Missing or invalid run configuration. Always fatal, raised before any
/// network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("unsupported store connection: {0}")]
    UnsupportedConnection(String),
}

/// Errors that abort a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("listing failed: {0}")]
    Listing(#[source] ApiError),

    #[error("loading existing keys failed: {0}")]
    ExistingKeys(#[source] StoreError),
}

impl SyncError {
    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
