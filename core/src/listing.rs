use std::sync::Arc;

use tracing::debug;

use crate::client::JGrantsClient;
use crate::error::ApiError;
use crate::query::ListingQuery;
use crate::transport::Transport;
use crate::types::ListingResponse;

/// Fetches one page of subsidy summaries.
///
/// No retries: a failed listing aborts the run and the next trigger tries
/// again.
#[derive(Clone)]
pub struct ListingClient {
    api: JGrantsClient,
    transport: Arc<dyn Transport>,
}

impl ListingClient {
    pub fn new(api: JGrantsClient, transport: Arc<dyn Transport>) -> Self {
        Self { api, transport }
    }

    pub fn fetch_listing(&self, query: &ListingQuery) -> Result<ListingResponse, ApiError> {
        let request = self.api.build_list_subsidies(query);
        let response = self.transport.execute(request)?;
        let listing = self.api.parse_list_subsidies(response)?;
        debug!(
            rows = listing.result.len(),
            total = listing.total_count(),
            "listing page fetched"
        );
        Ok(listing)
    }
}
