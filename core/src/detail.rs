//! Per-item detail fetching and attachment stripping.
//!
//! # Design
//! Emptiness and exclusion are two separate configurations. `is_empty_detail`
//! looks at the attachment fields as the server sent them, so it runs before
//! `FieldExclusion::apply` removes them; otherwise every stripped record
//! would look empty.

use std::sync::Arc;

use serde_json::Value;

use crate::client::JGrantsClient;
use crate::error::{ApiError, ConfigError};
use crate::transport::Transport;
use crate::types::DetailResponse;

/// Large base64 attachment fields carried by detail records.
pub const ATTACHMENT_FIELDS: [&str; 3] = [
    "application_guidelines",
    "outline_of_grant",
    "application_form",
];

/// Field names removed from a detail record before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExclusion {
    fields: Vec<String>,
}

impl Default for FieldExclusion {
    fn default() -> Self {
        Self {
            fields: ATTACHMENT_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl FieldExclusion {
    /// Blank names are dropped and duplicates collapsed. `id` addresses the
    /// stored object and cannot be excluded.
    pub fn new<I, S>(fields: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for field in fields {
            let field = field.as_ref().trim();
            if field.is_empty() || out.iter().any(|f| f == field) {
                continue;
            }
            if field == "id" {
                return Err(ConfigError::Invalid {
                    name: "exclude_fields",
                    reason: "the id field cannot be excluded".to_string(),
                });
            }
            out.push(field.to_string());
        }
        Ok(Self { fields: out })
    }

    pub fn none() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Strip the excluded fields from the first result element. Returns how
    /// many fields were removed.
    pub fn apply(&self, detail: &mut DetailResponse) -> usize {
        let Some(record) = detail.result.first_mut() else {
            return 0;
        };
        self.fields
            .iter()
            .filter(|field| record.fields.remove(field.as_str()).is_some())
            .count()
    }
}

/// True when the envelope holds no record, or none of the named attachment
/// fields on the record carry content.
pub fn is_empty_detail<S: AsRef<str>>(detail: &DetailResponse, attachment_fields: &[S]) -> bool {
    let Some(record) = detail.record() else {
        return true;
    };
    attachment_fields
        .iter()
        .all(|name| record.field(name.as_ref()).map_or(true, is_blank))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// A filtered detail envelope plus the emptiness verdict taken before
/// filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub response: DetailResponse,
    pub empty: bool,
}

#[derive(Clone)]
pub struct DetailClient {
    api: JGrantsClient,
    transport: Arc<dyn Transport>,
    exclusion: FieldExclusion,
}

impl DetailClient {
    pub fn new(api: JGrantsClient, transport: Arc<dyn Transport>, exclusion: FieldExclusion) -> Self {
        Self {
            api,
            transport,
            exclusion,
        }
    }

    /// Fetch, classify, and strip the detail record for `id`.
    ///
    /// An envelope with no record is `ApiError::NotFound` and a record whose
    /// `id` differs from the requested one is a decode error. Either would
    /// otherwise be stored under a key its content does not match.
    pub fn fetch_detail(&self, id: &str) -> Result<DetailRecord, ApiError> {
        let request = self.api.build_get_subsidy(id);
        let response = self.transport.execute(request)?;
        let mut detail = self.api.parse_get_subsidy(response)?;

        let Some(record) = detail.record() else {
            return Err(ApiError::NotFound(id.to_string()));
        };
        if record.id != id {
            return Err(ApiError::Decode(format!(
                "requested {id} but server returned {}",
                record.id
            )));
        }

        let empty = is_empty_detail(&detail, &ATTACHMENT_FIELDS);
        self.exclusion.apply(&mut detail);
        Ok(DetailRecord {
            response: detail,
            empty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};

    struct Fixed(HttpResponse);

    impl Transport for Fixed {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
            Ok(self.0.clone())
        }
    }

    fn detail_client(body: &str, exclusion: FieldExclusion) -> DetailClient {
        DetailClient::new(
            JGrantsClient::new("http://api.test"),
            Arc::new(Fixed(HttpResponse::new(200, body))),
            exclusion,
        )
    }

    fn parse(raw: &str) -> DetailResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn default_exclusion_strips_attachments() {
        let client = detail_client(
            r#"{"result":[{"id":"C","name":"n","application_guidelines":[{"name":"a.pdf","data":"JVBERi0="}],"outline_of_grant":[],"application_form":[{"name":"f.pdf","data":"JVBERi0="}]}]}"#,
            FieldExclusion::default(),
        );
        let record = client.fetch_detail("C").unwrap();
        let detail = record.response.record().unwrap();
        for field in ATTACHMENT_FIELDS {
            assert!(!detail.has_field(field), "{field} should be stripped");
        }
        assert_eq!(detail.field("name").unwrap(), "n");
        assert!(!record.empty);
    }

    #[test]
    fn emptiness_is_judged_before_stripping() {
        let client = detail_client(
            r#"{"result":[{"id":"D","application_guidelines":[],"outline_of_grant":[],"application_form":[]}]}"#,
            FieldExclusion::default(),
        );
        let record = client.fetch_detail("D").unwrap();
        assert!(record.empty);
        assert!(record.response.record().unwrap().fields.is_empty());
    }

    #[test]
    fn empty_result_envelope_is_not_found() {
        let client = detail_client(r#"{"result":[]}"#, FieldExclusion::default());
        let err = client.fetch_detail("E").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref id) if id == "E"));
        assert!(!err.is_transport());
    }

    #[test]
    fn mismatched_id_is_decode_error() {
        let client = detail_client(r#"{"result":[{"id":"OTHER"}]}"#, FieldExclusion::none());
        let err = client.fetch_detail("F").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn custom_exclusion_only_removes_named_fields() {
        let exclusion = FieldExclusion::new(["name", " ", "name"]).unwrap();
        assert_eq!(exclusion.fields(), ["name".to_string()]);
        let mut detail = parse(r#"{"result":[{"id":"G","name":"n","application_form":[1]}]}"#);
        assert_eq!(exclusion.apply(&mut detail), 1);
        let record = detail.record().unwrap();
        assert!(!record.has_field("name"));
        assert!(record.has_field("application_form"));
    }

    #[test]
    fn id_cannot_be_excluded() {
        assert!(FieldExclusion::new(["id"]).is_err());
    }

    #[test]
    fn blank_values_count_as_empty() {
        let detail = parse(
            r#"{"result":[{"id":"H","application_guidelines":null,"outline_of_grant":"","application_form":{}}]}"#,
        );
        assert!(is_empty_detail(&detail, &ATTACHMENT_FIELDS));

        let detail = parse(r#"{"result":[{"id":"H","outline_of_grant":[{"name":"o.pdf"}]}]}"#);
        assert!(!is_empty_detail(&detail, &ATTACHMENT_FIELDS));
    }
}
