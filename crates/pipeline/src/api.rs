//! Transport-agnostic endpoint handlers.
//!
//! Each handler takes a raw JSON body and returns a status code plus a JSON
//! body, so any HTTP framework can mount them.

use dealername_completion::CompletionService;
use dealername_model::{BatchRequest, Lead};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{process_batch, process_record, NameCache, ProcessingContext};

/// Status code and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, format!("Failed to serialize response: {e}")),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// Single-record enrichment: 200 with `{name, confidence, brand, flags, error?}`,
/// or 400 with `{error}` for unparseable input or a missing domain.
pub async fn handle_enrich<S, C>(ctx: &ProcessingContext<S, C>, body: &str) -> ApiResponse
where
    S: CompletionService,
    C: NameCache,
{
    let lead: Lead = match serde_json::from_str(body) {
        Ok(lead) => lead,
        Err(e) => return ApiResponse::error(400, format!("Invalid request body: {e}")),
    };
    let record = match lead.record() {
        Ok(record) => record,
        Err(rejected) => return ApiResponse::error(400, rejected.error.unwrap_or_default()),
    };
    if let Err(e) = record.validate() {
        return ApiResponse::error(400, e.to_string());
    }

    ApiResponse::ok(&process_record(ctx, &record).await)
}

/// Batch enrichment: 200 with `{results, manualReviewQueue, partial}`, or 400
/// with `{error}` when the body has no `leads` array. A lead that does not
/// parse as a record is rejected on its own.
pub async fn handle_batch<S, C>(ctx: &ProcessingContext<S, C>, body: &str) -> ApiResponse
where
    S: CompletionService,
    C: NameCache,
{
    let request: BatchRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => return ApiResponse::error(400, format!("Invalid request body: {e}")),
    };

    ApiResponse::ok(&process_batch(ctx, &request.leads).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoCache, PipelineConfig};
    use dealername_completion::NoCompletion;
    use dealername_lexicon::Lexicon;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn context() -> ProcessingContext<NoCompletion, NoCache> {
        let config = PipelineConfig {
            use_completion: false,
            ..Default::default()
        };
        ProcessingContext::new(Arc::new(Lexicon::builtin().unwrap()), NoCompletion, NoCache, config)
    }

    #[tokio::test]
    async fn test_enrich_ok() {
        let response = handle_enrich(&context(), r#"{"domain":"napleshonda.com","rowNum":4}"#).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["name"], "Naples Honda");
        assert_eq!(response.body["confidence"], 100);
        assert_eq!(response.body["brand"], "Honda");
        assert_eq!(response.body["rowNum"], 4);
        assert!(response.body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_enrich_missing_domain() {
        let response = handle_enrich(&context(), r#"{"city":"Naples"}"#).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({ "error": "Missing domain" }));
    }

    #[tokio::test]
    async fn test_enrich_null_domain() {
        let response = handle_enrich(&context(), r#"{"domain":null}"#).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({ "error": "Missing domain" }));

        let response = handle_enrich(&context(), r#"{"domain":123}"#).await;
        assert_eq!(response.status, 400);
        assert!(response.body["error"].as_str().unwrap().starts_with("Malformed input"));
    }

    #[tokio::test]
    async fn test_enrich_invalid_json() {
        let response = handle_enrich(&context(), "not json").await;
        assert_eq!(response.status, 400);
        assert!(response.body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_batch_with_missing_domain_is_ok() {
        let body = r#"{"leads":[{"domain":"napleshonda.com"},{"domain":""},{"domain":"graingernissan.com"}]}"#;
        let response = handle_batch(&context(), body).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["results"].as_array().unwrap().len(), 3);
        assert_eq!(response.body["results"][1]["name"], "");
        assert_eq!(response.body["partial"], false);
    }

    #[tokio::test]
    async fn test_batch_with_mistyped_domains_is_ok() {
        let body = r#"{"leads":[{"domain":null},{"domain":123},{"domain":"napleshonda.com"}]}"#;
        let response = handle_batch(&context(), body).await;
        assert_eq!(response.status, 200);

        let results = response.body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["error"], "Missing domain");
        assert!(results[1]["error"].as_str().unwrap().starts_with("Malformed input"));
        assert_eq!(results[2]["name"], "Naples Honda");
        assert_eq!(response.body["partial"], false);
    }

    #[tokio::test]
    async fn test_batch_without_leads() {
        let response = handle_batch(&context(), r#"{"records":[]}"#).await;
        assert_eq!(response.status, 400);
    }
}
