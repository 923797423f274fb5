//! Maps one GraphQL invocation onto the engine and the engine's result onto an HTTP response.

use crate::engine::{ExecutionError, GraphQLEngine, RequestDescriptor};
use crate::error::AdapterError;
use crate::types::{EventBody, HttpEvent, HttpResponse};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

pub const POST_BODY_MISSING: &str = "POST body missing.";
pub const JSON_PARSING_ERROR: &str = "Error parsing JSON POST body";

/// GraphQL operation(s) extracted from the request.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    /// GET request query string as sent, e.g. `{"query": "{ apiVersion }", "variables": "{\"a\":1}"}`
    Params(HashMap<String, String>),
    /// A parsed or already structured body: a single operation object or an array of them
    Json(Value),
    /// A body of an unknown content type, passed on unmodified
    Raw(String),
}

impl QueryPayload {
    /// Returns `true` for a batch of operations.
    pub fn is_batch(&self) -> bool {
        matches!(self, QueryPayload::Json(Value::Array(_)))
    }
}

/// Extracts the query from the event, runs it through the engine and converts the result into a response.
/// Client errors become 4xx/5xx responses. Only non-query engine failures are returned as `Err`.
pub async fn graphql_lambda<E: GraphQLEngine>(
    engine: &E,
    event: &HttpEvent,
    options: &E::Options,
) -> Result<HttpResponse, AdapterError> {
    let method = event.method();
    let headers = event.normalized_headers();

    let query = if method == "POST" {
        let body = match &event.body {
            Some(v) if !v.is_empty() => v,
            _ => {
                warn!("Empty POST body");
                return Ok(HttpResponse::new(500, POST_BODY_MISSING));
            }
        };

        let is_json = headers
            .get("content-type")
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        match body {
            EventBody::Text(text) if is_json => match serde_json::from_str::<Value>(text) {
                Ok(v) => QueryPayload::Json(v),
                Err(e) => {
                    warn!("Invalid JSON in POST body: {}", e);
                    return Ok(HttpResponse::new(415, JSON_PARSING_ERROR));
                }
            },
            EventBody::Text(text) => QueryPayload::Raw(text.clone()),
            EventBody::Structured(v) => QueryPayload::Json(v.clone()),
        }
    } else {
        QueryPayload::Params(event.query_string_parameters.clone().unwrap_or_default())
    };

    debug!("Query payload: {:?}", query);

    let request = RequestDescriptor {
        url: event.path.clone(),
        method: method.clone(),
        headers,
    };

    match engine.execute(query, request, options).await {
        Ok(resp) => {
            info!("GraphQL OK, {} bytes", resp.body.len());
            Ok(HttpResponse::new(200, resp.body).with_headers(resp.headers))
        }
        Err(ExecutionError::Query(e)) => {
            info!("GraphQL query error {}", e.status);
            debug!("Query error: {}", e.message);
            Ok(HttpResponse::new(e.status, e.message).with_headers(e.headers))
        }
        Err(ExecutionError::Internal(e)) => {
            error!("GraphQL engine failed: {}", e);
            Err(AdapterError::Internal(e))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::{BoxError, EngineResponse, FormatOptions, QueryError};
    use crate::types::InvocationContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the mock should do when `execute` is called.
    pub(crate) enum MockOutcome {
        Ok,
        QueryError(u16, &'static str),
        Internal(&'static str),
    }

    /// An engine that records its inputs and replies with a canned outcome.
    pub(crate) struct MockEngine {
        pub outcome: MockOutcome,
        pub starts: AtomicUsize,
        pub fail_start: bool,
        pub received: Mutex<Vec<(QueryPayload, RequestDescriptor)>>,
    }

    impl MockEngine {
        pub(crate) fn new(outcome: MockOutcome) -> Self {
            MockEngine {
                outcome,
                starts: AtomicUsize::new(0),
                fail_start: false,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GraphQLEngine for MockEngine {
        type Options = String;

        async fn start(&self) -> Result<(), BoxError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_start {
                return Err("no schema".into());
            }
            Ok(())
        }

        async fn build_options(&self, event: &HttpEvent, ctx: &InvocationContext) -> Result<String, BoxError> {
            Ok([event.path.as_str(), "#", ctx.request_id.as_str()].concat())
        }

        async fn execute(
            &self,
            query: QueryPayload,
            request: RequestDescriptor,
            _options: &String,
        ) -> Result<EngineResponse, ExecutionError> {
            self.received.lock().unwrap().push((query, request));
            match self.outcome {
                MockOutcome::Ok => Ok(EngineResponse {
                    body: r#"{"data":{"apiVersion":"1"}}"#.to_owned(),
                    headers: vec![("Content-Type", "application/json"), ("Access-Control-Max-Age", "1")]
                        .into_iter()
                        .collect(),
                }),
                MockOutcome::QueryError(status, msg) => Err(QueryError::new(status, msg)
                    .with_headers(vec![("Content-Type", "application/json")].into_iter().collect())
                    .into()),
                MockOutcome::Internal(msg) => Err(ExecutionError::Internal(msg.into())),
            }
        }

        fn format_errors(&self, errors: &[&(dyn std::error::Error + Send + Sync)], _: FormatOptions) -> Vec<Value> {
            errors
                .iter()
                .map(|e| serde_json::json!({ "message": e.to_string() }))
                .collect()
        }
    }

    fn event(method: &str, content_type: Option<&str>, body: Option<&str>) -> HttpEvent {
        let mut headers = HashMap::new();
        if let Some(ct) = content_type {
            headers.insert("Content-Type".to_owned(), ct.to_owned());
        }
        HttpEvent {
            http_method: method.to_owned(),
            path: "/graphql".to_owned(),
            headers,
            body: body.map(|b| EventBody::Text(b.to_owned())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn post_without_body() {
        let engine = MockEngine::new(MockOutcome::Ok);

        for body in [None, Some("")] {
            let resp = graphql_lambda(&engine, &event("POST", Some("application/json"), body), &String::new())
                .await
                .unwrap();
            assert_eq!(resp.status_code, 500);
            assert_eq!(resp.body, POST_BODY_MISSING);
            assert!(resp.headers.is_empty());
        }
        assert!(engine.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_with_invalid_json() {
        let engine = MockEngine::new(MockOutcome::Ok);
        let resp = graphql_lambda(&engine, &event("POST", Some("application/json"), Some("{")), &String::new())
            .await
            .unwrap();
        assert_eq!(resp.status_code, 415);
        assert_eq!(resp.body, JSON_PARSING_ERROR);
        assert!(engine.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_json_batch() {
        let engine = MockEngine::new(MockOutcome::Ok);
        let body = r#"[{"query":"{ a }"},{"query":"{ b }"}]"#;
        let resp = graphql_lambda(
            &engine,
            &event("POST", Some("application/json; charset=utf-8"), Some(body)),
            &String::new(),
        )
        .await
        .unwrap();
        assert_eq!(resp.status_code, 200);

        let received = engine.received.lock().unwrap();
        assert!(received[0].0.is_batch());
        assert_eq!(received[0].0, QueryPayload::Json(serde_json::from_str(body).unwrap()));
    }

    #[tokio::test]
    async fn post_other_content_type_passes_raw_body() {
        let engine = MockEngine::new(MockOutcome::Ok);
        let body = r#"{"query":"{ a }"}"#;
        for ct in [None, Some("text/plain")] {
            graphql_lambda(&engine, &event("POST", ct, Some(body)), &String::new())
                .await
                .unwrap();
        }

        let received = engine.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        for (payload, _) in received.iter() {
            assert_eq!(payload, &QueryPayload::Raw(body.to_owned()));
        }
    }

    #[tokio::test]
    async fn get_passes_query_params_verbatim() {
        let engine = MockEngine::new(MockOutcome::Ok);
        let mut params = HashMap::new();
        params.insert("query".to_owned(), "{ __typename }".to_owned());

        let mut ev = event("GET", None, None);
        ev.headers.insert("X-Api-Key".to_owned(), "abc".to_owned());
        ev.query_string_parameters = Some(params.clone());

        let resp = graphql_lambda(&engine, &ev, &String::new()).await.unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, r#"{"data":{"apiVersion":"1"}}"#);
        assert_eq!(resp.headers.get("content-type"), Some("application/json"));

        let received = engine.received.lock().unwrap();
        let (payload, request) = &received[0];
        assert_eq!(payload, &QueryPayload::Params(params));
        assert_eq!(request.url, "/graphql");
        assert_eq!(request.method, "GET");
        assert_eq!(request.headers.get("x-api-key"), Some("abc"));
    }

    #[tokio::test]
    async fn query_error_becomes_response() {
        let engine = MockEngine::new(MockOutcome::QueryError(400, r#"{"errors":[]}"#));
        let mut ev = event("GET", None, None);
        ev.query_string_parameters = Some(HashMap::new());

        let resp = graphql_lambda(&engine, &ev, &String::new()).await.unwrap();
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.body, r#"{"errors":[]}"#);
        assert_eq!(resp.headers.get("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn internal_error_propagates() {
        let engine = MockEngine::new(MockOutcome::Internal("boom"));
        let res = graphql_lambda(&engine, &event("GET", None, None), &String::new()).await;
        match res {
            Err(AdapterError::Internal(e)) => assert_eq!(e.to_string(), "boom"),
            v => panic!("Unexpected result: {:?}", v),
        }
    }

    #[tokio::test]
    async fn structured_body_passes_through() {
        let engine = MockEngine::new(MockOutcome::Ok);
        let mut ev = event("POST", Some("multipart/form-data; boundary=x"), None);
        let ops = serde_json::json!({"query": "mutation ($f: Upload) { upload(file: $f) }", "variables": {"f": null}});
        ev.body = Some(EventBody::Structured(ops.clone()));

        graphql_lambda(&engine, &ev, &String::new()).await.unwrap();
        assert_eq!(engine.received.lock().unwrap()[0].0, QueryPayload::Json(ops));
    }
}
