use super::{Ctx, Query};
use juniper::graphql_object;

// This block has to contain all queries for the macro to work.
#[graphql_object(context = Ctx)]
impl Query {
    /// Version of the deployed API, e.g. `0.1.0`.
    fn api_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Returns the message as is. Useful for checking variables and connectivity.
    fn echo(message: String) -> String {
        message
    }

    /// The path the request was sent to, as seen by the function.
    fn request_path(context: &Ctx) -> String {
        context.request_path.clone()
    }

    /// HTTP method of the request, e.g. `POST`.
    fn request_method(context: &Ctx) -> String {
        context.method.clone()
    }

    /// The full API Gateway path including the stage, if known.
    fn stage_path(context: &Ctx) -> Option<String> {
        context.stage_path.clone()
    }

    /// Lambda request ID of the current invocation.
    fn request_id(context: &Ctx) -> String {
        context.request_id.clone()
    }

    /// Value of a request header, case-insensitive.
    fn header(context: &Ctx, name: String) -> Option<String> {
        context.headers.get(&name).map(|v| v.to_owned())
    }
}
