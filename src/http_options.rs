use crate::headers::NormalizedHeaders;
use crate::types::{HttpEvent, HttpResponse};
use tracing::{debug, info};

/// Returns an HTTP response to a CORS preflight (OPTIONS) request: 204, no body, CORS headers only.
/// The GraphQL engine is not involved.
///
/// See https://developer.mozilla.org/en-US/docs/Web/HTTP/Methods/OPTIONS
pub(crate) fn http_options_response(req: &HttpEvent, cors_headers: NormalizedHeaders) -> HttpResponse {
    info!("HTTP OPTIONS");
    debug!("OPTIONS: {:?}", req);

    HttpResponse::new(204, "").with_headers(cors_headers)
}
