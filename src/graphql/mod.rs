use crate::bridge::QueryPayload;
use crate::engine::{
    BoxError, EngineResponse, ExecutionError, FormatOptions, GraphQLEngine, QueryError, RequestDescriptor,
};
use crate::headers::NormalizedHeaders;
use crate::types::{HttpEvent, InvocationContext};
use async_trait::async_trait;
use juniper::http::{GraphQLBatchRequest, GraphQLRequest};
use juniper::{EmptyMutation, EmptySubscription, InputValue, RootNode};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use tracing::{error, info};

// a list of query resolvers
mod query;

/// A container for Query resolvers implemented in separate files.
pub struct Query;

/// A context structure for passing to query resolvers
pub struct Ctx {
    /// Path of the request as seen by the function, e.g. `/graphql`
    pub request_path: String,
    pub method: String,
    /// API Gateway path including the stage, e.g. `/prod/graphql`
    pub stage_path: Option<String>,
    pub request_id: String,
    pub headers: NormalizedHeaders,
}
impl juniper::Context for Ctx {}

pub type Schema = RootNode<'static, Query, EmptyMutation<Ctx>, EmptySubscription<Ctx>>;

/// Per-invocation data taken from the raw event and the Lambda context.
#[derive(Debug, Clone)]
pub struct JuniperOptions {
    pub request_id: String,
    pub stage_path: Option<String>,
}

/// A [GraphQLEngine] that executes operations against the schema in [query] with juniper.
#[derive(Default)]
pub struct JuniperEngine {
    /// Built once by `start()` and reused by all invocations in the container
    schema: OnceCell<Schema>,
}

impl JuniperEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphQLEngine for JuniperEngine {
    type Options = JuniperOptions;

    async fn start(&self) -> Result<(), BoxError> {
        self.schema.get_or_init(|| {
            info!("Building GraphQL schema");
            RootNode::new(Query, EmptyMutation::<Ctx>::new(), EmptySubscription::<Ctx>::new())
        });
        Ok(())
    }

    async fn build_options(&self, event: &HttpEvent, ctx: &InvocationContext) -> Result<JuniperOptions, BoxError> {
        Ok(JuniperOptions {
            request_id: ctx.request_id.clone(),
            stage_path: event.request_context.as_ref().and_then(|v| v.path.clone()),
        })
    }

    async fn execute(
        &self,
        query: QueryPayload,
        request: RequestDescriptor,
        options: &JuniperOptions,
    ) -> Result<EngineResponse, ExecutionError> {
        let schema = self
            .schema
            .get()
            .ok_or_else(|| ExecutionError::Internal("GraphQL schema is not initialized".into()))?;

        let gql_request = to_batch_request(query)?;
        let is_batch = matches!(gql_request, GraphQLBatchRequest::Batch(_));

        // a struct to be passed to resolvers for accessing request details
        let context = Ctx {
            request_path: request.url,
            method: request.method,
            stage_path: options.stage_path.clone(),
            request_id: options.request_id.clone(),
            headers: request.headers,
        };

        let res = gql_request.execute(schema, &context).await;

        // they will be returned as part of the response to the caller inside GQL response, but we need to know about them at the back end
        if !res.is_ok() {
            error!("GQL execution error, gql: {:?}", gql_request);
        }

        let body = match serde_json::to_string(&res) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed serializing GraphQLResponse with {}", e);
                return Err(ExecutionError::Internal(Box::new(e)));
            }
        };

        let headers = json_headers(&body);

        // a single operation that could not be executed at all is a client error,
        // batches always return 200 with per-operation results
        if !is_batch && !res.is_ok() {
            return Err(QueryError::new(400, body).with_headers(headers).into());
        }

        Ok(EngineResponse { body, headers })
    }

    fn format_errors(&self, errors: &[&(dyn std::error::Error + Send + Sync)], options: FormatOptions) -> Vec<Value> {
        errors
            .iter()
            .map(|e| {
                if options.debug {
                    json!({"message": e.to_string(), "extensions": {"exception": {"debug": format!("{:?}", e)}}})
                } else {
                    json!({ "message": e.to_string() })
                }
            })
            .collect()
    }
}

/// Converts the payload extracted from the HTTP request into a juniper request.
fn to_batch_request(query: QueryPayload) -> Result<GraphQLBatchRequest, QueryError> {
    match query {
        QueryPayload::Params(params) => {
            let gql = match params.get("query") {
                Some(v) if !v.is_empty() => v.clone(),
                _ => return Err(QueryError::new(400, "GET query missing.")),
            };

            // variables arrive as a JSON-encoded string in the query string
            let variables = match params.get("variables") {
                Some(v) if !v.is_empty() => match serde_json::from_str::<InputValue>(v) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        info!("Invalid variables: {}", e);
                        return Err(QueryError::new(400, "Variables are invalid JSON."));
                    }
                },
                _ => None,
            };

            let operation_name = params.get("operationName").filter(|v| !v.is_empty()).cloned();

            Ok(GraphQLBatchRequest::Single(GraphQLRequest::new(gql, operation_name, variables)))
        }
        QueryPayload::Json(v) => serde_json::from_value::<GraphQLBatchRequest>(v).map_err(|e| {
            info!("Invalid GraphQL request: {}", e);
            QueryError::new(400, "Invalid GraphQL request.")
        }),
        QueryPayload::Raw(v) => serde_json::from_str::<GraphQLBatchRequest>(&v).map_err(|e| {
            info!("Invalid raw GraphQL request: {}", e);
            QueryError::new(400, "POST body sent invalid JSON.")
        }),
    }
}

fn json_headers(body: &str) -> NormalizedHeaders {
    let mut headers = NormalizedHeaders::new();
    headers.set("Content-Type", "application/json");
    headers.set("Content-Length", body.len().to_string());
    headers
}
