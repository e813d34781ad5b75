//! Wire types for the subsidy listing and detail endpoints.
//!
//! # Design
//! Only the fields the pipeline reads are typed. Everything else is kept in a
//! flattened JSON map so a persisted record carries the upstream payload
//! as-is, minus the excluded fields. The mock-server crate defines its own
//! copies of these shapes; the integration tests catch schema drift.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the listing response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsidySummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target_area_search: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingMetadata {
    #[serde(default)]
    pub resultset: ResultSet,
}

/// Envelope returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingResponse {
    #[serde(default)]
    pub metadata: ListingMetadata,
    pub result: Vec<SubsidySummary>,
}

impl ListingResponse {
    /// Total number of matches reported by the server, which may exceed the
    /// number of rows on this page.
    pub fn total_count(&self) -> u64 {
        self.metadata.resultset.count
    }
}

/// A full detail record. `id` is typed; every other field stays opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsidyDetail {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SubsidyDetail {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Envelope returned by the detail endpoint: zero or one record, plus any
/// other top-level keys the server sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailResponse {
    #[serde(default)]
    pub result: Vec<SubsidyDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailResponse {
    pub fn record(&self) -> Option<&SubsidyDetail> {
        self.result.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keeps_unknown_fields() {
        let summary: SubsidySummary = serde_json::from_str(
            r#"{"id":"a0W1","title":"IT導入補助金","target_area_search":"全国","subsidy_max_limit":4500000}"#,
        )
        .unwrap();
        assert_eq!(summary.id, "a0W1");
        assert_eq!(summary.target_area_search.as_deref(), Some("全国"));
        assert_eq!(summary.extra["subsidy_max_limit"], 4500000);
    }

    #[test]
    fn summary_requires_id() {
        let result: Result<SubsidySummary, _> = serde_json::from_str(r#"{"title":"no id"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn listing_count_defaults_to_zero_without_metadata() {
        let listing: ListingResponse = serde_json::from_str(r#"{"result":[]}"#).unwrap();
        assert_eq!(listing.total_count(), 0);
        assert!(listing.result.is_empty());
    }

    #[test]
    fn listing_requires_result() {
        let result: Result<ListingResponse, _> =
            serde_json::from_str(r#"{"metadata":{"resultset":{"count":3}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn detail_envelope_preserves_extra_keys() {
        let raw = r#"{"metadata":{"type":"detail"},"result":[{"id":"X","name":"n"}]}"#;
        let detail: DetailResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.record().unwrap().id, "X");
        let back = serde_json::to_value(&detail).unwrap();
        assert_eq!(back["metadata"]["type"], "detail");
        assert_eq!(back["result"][0]["name"], "n");
    }
}
