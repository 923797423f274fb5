//! CORS headers for every response the adapter produces.
//!
//! The request-independent part of the policy is computed once per container by [base_headers] and reused
//! for every invocation. [request_headers] copies it and adds the parts that depend on the request's
//! `Origin` and `Access-Control-Request-Headers`.
//!
//! See https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS

use crate::headers::NormalizedHeaders;
use serde::Deserialize;
use tracing::debug;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
pub const MAX_AGE: &str = "Access-Control-Max-Age";
pub const REQUEST_HEADERS: &str = "Access-Control-Request-Headers";

/// Which origins may read the response.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// `true` reflects whatever `Origin` the request came with, `false` never sends the header.
    Reflect(bool),
    /// Sent verbatim regardless of the request, e.g. `*` or `https://stackmuncher.com`.
    Literal(String),
    /// The request `Origin` is reflected only if it is on the list.
    List(Vec<String>),
}

/// A single value or a list of values, e.g. `"GET,POST"` or `["GET", "POST"]`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// Joins the list with commas the way browsers expect it in CORS headers.
    pub fn joined(&self) -> String {
        match self {
            StringOrList::One(v) => v.clone(),
            StringOrList::Many(v) => v.join(","),
        }
    }
}

impl From<&str> for StringOrList {
    fn from(v: &str) -> Self {
        StringOrList::One(v.to_owned())
    }
}

impl From<Vec<&str>> for StringOrList {
    fn from(v: Vec<&str>) -> Self {
        StringOrList::Many(v.into_iter().map(|s| s.to_owned()).collect())
    }
}

/// CORS settings of the adapter. All members are optional and only the ones present produce headers.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorsPolicy {
    pub origin: Option<CorsOrigin>,
    pub methods: Option<StringOrList>,
    pub allowed_headers: Option<StringOrList>,
    pub exposed_headers: Option<StringOrList>,
    #[serde(default)]
    pub credentials: bool,
    pub max_age: Option<u64>,
}

/// Returns the part of CORS headers that does not depend on the request.
pub fn base_headers(policy: Option<&CorsPolicy>) -> NormalizedHeaders {
    let mut headers = NormalizedHeaders::new();

    let policy = match policy {
        Some(v) => v,
        None => return headers,
    };

    if let Some(methods) = &policy.methods {
        headers.set(ALLOW_METHODS, methods.joined());
    }
    if let Some(allowed) = &policy.allowed_headers {
        headers.set(ALLOW_HEADERS, allowed.joined());
    }
    if let Some(exposed) = &policy.exposed_headers {
        headers.set(EXPOSE_HEADERS, exposed.joined());
    }
    if policy.credentials {
        headers.set(ALLOW_CREDENTIALS, "true");
    }
    if let Some(max_age) = policy.max_age {
        headers.set(MAX_AGE, max_age.to_string());
    }

    debug!("Base CORS headers: {:?}", headers);
    headers
}

/// Copies `base` and adds the headers that depend on the incoming request.
/// `base` is never modified so it can be shared between invocations.
pub fn request_headers(
    base: &NormalizedHeaders,
    policy: Option<&CorsPolicy>,
    req_headers: &NormalizedHeaders,
) -> NormalizedHeaders {
    let mut headers = base.clone();

    let policy = match policy {
        Some(v) => v,
        None => return headers,
    };

    let req_origin = req_headers.get("origin");
    match (&policy.origin, req_origin) {
        (Some(CorsOrigin::Literal(origin)), _) => headers.set(ALLOW_ORIGIN, origin.as_str()),
        (Some(CorsOrigin::Reflect(true)), Some(req_origin)) => headers.set(ALLOW_ORIGIN, req_origin),
        (Some(CorsOrigin::List(allowed)), Some(req_origin)) if allowed.iter().any(|o| o == req_origin) => {
            headers.set(ALLOW_ORIGIN, req_origin)
        }
        _ => {
            debug!("No {} for origin {:?}", ALLOW_ORIGIN, req_origin);
        }
    }

    // reflect whatever the browser asked for if the policy is silent about it
    if policy.allowed_headers.is_none() {
        if let Some(requested) = req_headers.get(REQUEST_HEADERS) {
            headers.set(ALLOW_HEADERS, requested);
        }
    }

    headers
}
