use crate::headers::NormalizedHeaders;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Request body as it arrives from API Gateway or after the upload processor replaced it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EventBody {
    /// The body string exactly as sent by API Gateway, possibly base64 encoded.
    Text(String),
    /// A body that was already converted into a structure, e.g. GraphQL operations with uploaded files.
    Structured(Value),
}

impl EventBody {
    /// Returns `true` for an empty string body. Structured bodies are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            EventBody::Text(v) => v.is_empty(),
            EventBody::Structured(v) => v.is_null(),
        }
    }
}

/// An inner member of HttpEvent
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpEventRequestContext {
    pub path: Option<String>,
}

/// The API Gateway (REST API, payload v1.0) proxy request with fields of interest.
/// ```json
/// {
///   "httpMethod": "POST",
///   "path": "/graphql",
///   "headers": { "content-type": "application/json" },
///   "queryStringParameters": null,
///   "body": "{\"query\":\"{ apiVersion }\"}",
///   "isBase64Encoded": false
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpEvent {
    pub http_method: String,
    #[serde(default)]
    pub path: String,
    /// API Gateway sends `null` when the request has no headers
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<EventBody>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: Option<HttpEventRequestContext>,
}

impl HttpEvent {
    /// HTTP method in upper case, e.g. `GET`.
    pub fn method(&self) -> String {
        self.http_method.to_uppercase()
    }

    /// A case-insensitive copy of the raw request headers.
    pub fn normalized_headers(&self) -> NormalizedHeaders {
        NormalizedHeaders::from(&self.headers)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The full response structure for sending back to API Gateway
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub is_base64_encoded: bool,
    pub status_code: u16,
    pub headers: NormalizedHeaders,
    pub body: String,
}

impl HttpResponse {
    /// Prepares a response with no headers. CORS and content headers are added by the caller.
    pub fn new<B: Into<String>>(status_code: u16, body: B) -> Self {
        HttpResponse {
            is_base64_encoded: false,
            status_code,
            headers: NormalizedHeaders::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(mut self, headers: NormalizedHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Converts itself to serde_json::Value
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Per-invocation data from the Lambda runtime.
///
/// `callback_waits_for_empty_event_loop` mirrors the Lambda flag of the same name: when `false` the host may
/// freeze the container as soon as the response is delivered without waiting for background tasks.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    /// Execution deadline in ms since the epoch, if known
    pub deadline: Option<u64>,
    pub callback_waits_for_empty_event_loop: bool,
}

impl Default for InvocationContext {
    fn default() -> Self {
        InvocationContext {
            request_id: String::new(),
            deadline: None,
            callback_waits_for_empty_event_loop: true,
        }
    }
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(ctx: &lambda_runtime::Context) -> Self {
        InvocationContext {
            request_id: ctx.request_id.clone(),
            deadline: Some(ctx.deadline),
            callback_waits_for_empty_event_loop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deser_post_event() {
        let event = serde_json::from_str::<HttpEvent>(
            r#"{"httpMethod":"post","path":"/graphql","headers":{"Content-Type":"application/json"},
                "queryStringParameters":null,"body":"{\"query\":\"{ apiVersion }\"}","isBase64Encoded":false,
                "requestContext":{"path":"/prod/graphql"}}"#,
        )
        .unwrap();

        assert_eq!(event.method(), "POST");
        assert_eq!(event.normalized_headers().get("content-type"), Some("application/json"));
        assert_eq!(event.body, Some(EventBody::Text(r#"{"query":"{ apiVersion }"}"#.to_owned())));
        assert!(event.query_string_parameters.is_none());
        assert_eq!(event.request_context.unwrap().path.as_deref(), Some("/prod/graphql"));
    }

    #[test]
    fn deser_event_with_null_headers() {
        let event =
            serde_json::from_str::<HttpEvent>(r#"{"httpMethod":"GET","path":"/","headers":null,"body":null}"#).unwrap();
        assert!(event.headers.is_empty());
        assert!(event.body.is_none());
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn response_serializes_camel_case() {
        let resp = HttpResponse::new(204, "");
        let v = resp.to_value().unwrap();
        assert_eq!(v["statusCode"], 204);
        assert_eq!(v["isBase64Encoded"], false);
        assert_eq!(v["body"], "");
    }
}
