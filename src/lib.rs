//! Serves GraphQL over API Gateway proxy events on AWS Lambda.
//!
//! [Adapter] is the entry point. It answers CORS preflight requests, serves an in-browser query tool,
//! converts multipart uploads into structured request bodies and hands everything else to a
//! [GraphQLEngine] via [graphql_lambda].

mod bridge;
mod config;
mod cors;
mod engine;
mod error;
mod graphql;
mod handler;
mod headers;
mod http_options;
mod playground;
mod types;
mod upload;

pub use bridge::{graphql_lambda, QueryPayload, JSON_PARSING_ERROR, POST_BODY_MISSING};
pub use config::{init_logging, AdapterConfig, ConfigError};
pub use cors::{CorsOrigin, CorsPolicy, StringOrList};
pub use engine::{BoxError, EngineResponse, ExecutionError, FormatOptions, GraphQLEngine, QueryError, RequestDescriptor};
pub use error::AdapterError;
pub use graphql::{Ctx, JuniperEngine, JuniperOptions, Query, Schema};
pub use handler::Adapter;
pub use headers::NormalizedHeaders;
pub use playground::{JuniperPages, RenderOptions, ToolKind, ToolPageConfig, ToolPageRenderer};
pub use types::{EventBody, HttpEvent, HttpEventRequestContext, HttpResponse, InvocationContext};
pub use upload::{byte_channel, BytePusher, ByteStream, MultipartProcessor, Upload, UploadConfig, UploadError, UploadProcessor};
