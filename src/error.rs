use crate::engine::BoxError;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors that fail the whole invocation. They are returned to the Lambda runtime which reports them
/// to API Gateway, so the client gets a generic 502/500 rather than a response from the adapter.
///
/// Client errors (missing body, bad JSON) and query errors are never reported this way. They become
/// normal HTTP responses.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The engine could not start. Every request that needs the engine fails with the same error.
    #[error("GraphQL engine failed to start: {0}")]
    Startup(Arc<BoxError>),
    /// Upload processing failed. The payload is the output of the engine's error formatter.
    #[error("File upload failed: {}", serde_json::to_string(.0).unwrap_or_default())]
    Upload(Vec<Value>),
    /// The engine or the options builder failed for a reason other than a query error.
    #[error("{0}")]
    Internal(BoxError),
}
