//! Stateless HTTP request builder and response parser for the subsidy API.
//!
//! # Design
//! `JGrantsClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! `ListingClient` and `DetailClient` pair these with a transport.

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::query::ListingQuery;
use crate::types::{DetailResponse, ListingResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.jgrants-portal.go.jp/exp/v1/public";

#[derive(Debug, Clone)]
pub struct JGrantsClient {
    base_url: String,
}

impl Default for JGrantsClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl JGrantsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_subsidies(&self, query: &ListingQuery) -> HttpRequest {
        let mut req = HttpRequest::get(format!("{}/subsidies", self.base_url))
            .header("accept", "application/json");
        req.query = query.params();
        req
    }

    pub fn build_get_subsidy(&self, id: &str) -> HttpRequest {
        HttpRequest::get(format!("{}/subsidies/id/{}", self.base_url, urlencoding::encode(id)))
            .header("accept", "application/json")
    }

    pub fn parse_list_subsidies(&self, response: HttpResponse) -> Result<ListingResponse, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn parse_get_subsidy(&self, response: HttpResponse) -> Result<DetailResponse, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::HttpStatus {
        status: response.status,
        body: truncate(&response.body, 512),
    })
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Acceptance, SortOrder};

    fn client() -> JGrantsClient {
        JGrantsClient::new("http://localhost:3000/exp/v1/public")
    }

    #[test]
    fn build_list_subsidies_produces_correct_request() {
        let query = ListingQuery {
            sort_order: SortOrder::Asc,
            acceptance: Acceptance::All,
            ..ListingQuery::default()
        };
        let req = client().build_list_subsidies(&query);
        assert_eq!(req.url, "http://localhost:3000/exp/v1/public/subsidies");
        assert_eq!(req.query_value("keyword"), Some("補助金"));
        assert_eq!(req.query_value("order"), Some("ASC"));
        assert_eq!(req.query_value("acceptance"), Some("0"));
        assert_eq!(req.query_value("target_area_search"), None);
        assert_eq!(
            req.headers,
            vec![("accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn build_get_subsidy_embeds_id_in_path() {
        let req = client().build_get_subsidy("a0WJ200000CDRBGMA5");
        assert_eq!(
            req.url,
            "http://localhost:3000/exp/v1/public/subsidies/id/a0WJ200000CDRBGMA5"
        );
        assert!(req.query.is_empty());
    }

    #[test]
    fn build_get_subsidy_escapes_reserved_characters() {
        let req = client().build_get_subsidy("a/b c");
        assert!(req.url.ends_with("/subsidies/id/a%2Fb%20c"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = JGrantsClient::new("http://localhost:3000/");
        let req = client.build_list_subsidies(&ListingQuery::default());
        assert_eq!(req.url, "http://localhost:3000/subsidies");
    }

    #[test]
    fn parse_list_subsidies_success() {
        let response = HttpResponse::new(
            200,
            r#"{"metadata":{"resultset":{"count":2}},"result":[{"id":"A","title":"一"},{"id":"B","title":"二"}]}"#,
        );
        let listing = client().parse_list_subsidies(response).unwrap();
        assert_eq!(listing.total_count(), 2);
        assert_eq!(listing.result[1].id, "B");
    }

    #[test]
    fn parse_list_subsidies_bad_json() {
        let response = HttpResponse::new(200, "not json");
        let err = client().parse_list_subsidies(response).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn parse_list_subsidies_server_error() {
        let response = HttpResponse::new(503, "maintenance");
        let err = client().parse_list_subsidies(response).unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 503, .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn parse_get_subsidy_empty_result() {
        let response = HttpResponse::new(200, r#"{"result":[]}"#);
        let detail = client().parse_get_subsidy(response).unwrap();
        assert!(detail.record().is_none());
    }

    #[test]
    fn error_body_is_truncated() {
        let response = HttpResponse::new(500, "x".repeat(2000));
        match client().parse_get_subsidy(response).unwrap_err() {
            ApiError::HttpStatus { body, .. } => assert_eq!(body.len(), 515),
            other => panic!("unexpected error: {other}"),
        }
    }
}
