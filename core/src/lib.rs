//! Incremental ingestion of public subsidy records.
//!
//! # Overview
//! A run lists subsidies from the upstream API, drops the ones already in the
//! record store, fetches the detail record for each remaining ID, strips the
//! large attachment fields, and writes one `<id>.json` object per record.
//!
//! # Design
//! - `JGrantsClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network; `Transport` performs the I/O.
//! - `ListingClient` and `DetailClient` pair the two.
//! - `RecordStore` is the blob-store contract; `MemoryStore` and `FsStore`
//!   implement it.
//! - `SyncOrchestrator` runs list → diff → fetch → persist and reports a
//!   `RunOutcome`. Per-item failures are counted, never raised.

pub mod client;
pub mod config;
pub mod detail;
pub mod error;
pub mod existing;
pub mod http;
pub mod listing;
pub mod query;
pub mod store;
pub mod sync;
pub mod transport;
pub mod types;

pub use client::JGrantsClient;
pub use config::{StoreConnection, SyncConfig};
pub use detail::{is_empty_detail, DetailClient, DetailRecord, FieldExclusion, ATTACHMENT_FIELDS};
pub use error::{ApiError, ConfigError, StoreError, SyncError};
pub use existing::load_existing;
pub use http::{HttpRequest, HttpResponse};
pub use listing::ListingClient;
pub use query::{Acceptance, ListingQuery, SortField, SortOrder};
pub use store::{FsStore, MemoryStore, RecordStore};
pub use sync::{CancelToken, RunOutcome, SyncOptions, SyncOrchestrator};
pub use transport::{Transport, UreqTransport};
pub use types::{DetailResponse, ListingResponse, SubsidyDetail, SubsidySummary};
