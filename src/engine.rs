//! The contract between the adapter and whatever executes GraphQL operations.

use crate::bridge::QueryPayload;
use crate::headers::NormalizedHeaders;
use crate::types::{HttpEvent, InvocationContext};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A boxed error for failures the adapter does not need to look into.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Describes the HTTP request that carried the GraphQL operation.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The event path, e.g. `/graphql`
    pub url: String,
    pub method: String,
    pub headers: NormalizedHeaders,
}

/// A successfully executed operation, ready to be sent back as is.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub body: String,
    pub headers: NormalizedHeaders,
}

/// An error raised by the engine that already knows its HTTP status and headers,
/// e.g. a query that failed validation.
#[derive(Error, Debug, Clone)]
#[error("{status}: {message}")]
pub struct QueryError {
    pub status: u16,
    pub headers: NormalizedHeaders,
    pub message: String,
}

impl QueryError {
    pub fn new<M: Into<String>>(status: u16, message: M) -> Self {
        QueryError {
            status,
            headers: NormalizedHeaders::new(),
            message: message.into(),
        }
    }

    pub fn with_headers(mut self, headers: NormalizedHeaders) -> Self {
        self.headers = headers;
        self
    }
}

/// Everything that can go wrong inside [GraphQLEngine::execute].
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Mapped 1:1 into an HTTP response
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Propagated to the Lambda runtime as a failed invocation
    #[error("GraphQL engine failure: {0}")]
    Internal(BoxError),
}

/// Options for [GraphQLEngine::format_errors]
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Include messages and details of internal errors in the output
    pub debug: bool,
}

#[async_trait]
pub trait GraphQLEngine: Send + Sync + 'static {
    /// Per-request options built from the raw event, e.g. the resolver context.
    type Options: Send + Sync;

    /// Prepares the engine. Called once per container, before the first operation is executed.
    async fn start(&self) -> Result<(), BoxError>;

    /// Builds the options for a single invocation. The raw event and the invocation context
    /// are made available to resolvers through them.
    async fn build_options(&self, event: &HttpEvent, ctx: &InvocationContext) -> Result<Self::Options, BoxError>;

    /// Executes the operation(s) in `query`.
    async fn execute(
        &self,
        query: QueryPayload,
        request: RequestDescriptor,
        options: &Self::Options,
    ) -> Result<EngineResponse, ExecutionError>;

    /// Converts errors into GraphQL error objects, e.g. `{"message": "..."}`.
    fn format_errors(&self, errors: &[&(dyn std::error::Error + Send + Sync)], options: FormatOptions) -> Vec<Value>;
}
