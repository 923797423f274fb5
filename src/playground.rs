use serde::Deserialize;
use tracing::info;

/// Which in-browser query tool to serve.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    GraphiQL,
    Playground,
}

/// Settings for the HTML query tool. Its presence in the adapter config enables the tool page.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolPageConfig {
    pub kind: ToolKind,
    /// Websocket endpoint for subscriptions, if the API has one
    pub subscriptions_endpoint: Option<String>,
}

/// Everything the renderer needs for a single page.
#[derive(Debug, Clone)]
pub struct RenderOptions<'a> {
    /// The GraphQL endpoint the page sends queries to, normally the path of the current request
    pub endpoint: &'a str,
    pub config: &'a ToolPageConfig,
}

/// Produces the HTML of the query tool page.
pub trait ToolPageRenderer: Send + Sync {
    fn render(&self, options: RenderOptions<'_>) -> String;
}

/// Renders the pages bundled with juniper.
#[derive(Debug, Default, Clone, Copy)]
pub struct JuniperPages;

impl ToolPageRenderer for JuniperPages {
    fn render(&self, options: RenderOptions<'_>) -> String {
        info!("Rendering {:?} for {}", options.config.kind, options.endpoint);
        let subscriptions = options.config.subscriptions_endpoint.as_deref();
        match options.config.kind {
            ToolKind::GraphiQL => juniper::http::graphiql::graphiql_source(options.endpoint, subscriptions),
            ToolKind::Playground => juniper::http::playground::playground_source(options.endpoint, subscriptions),
        }
    }
}
