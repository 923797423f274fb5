//! Turns API Gateway events into GraphQL invocations and GraphQL results back into API Gateway responses.

use crate::bridge;
use crate::config::AdapterConfig;
use crate::cors;
use crate::engine::{BoxError, FormatOptions, GraphQLEngine};
use crate::error::AdapterError;
use crate::headers::NormalizedHeaders;
use crate::http_options::http_options_response;
use crate::playground::{JuniperPages, RenderOptions, ToolPageRenderer};
use crate::types::{EventBody, HttpEvent, HttpResponse, InvocationContext};
use crate::upload::{byte_channel, MultipartProcessor, UploadProcessor};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Resolves once the engine finished its one-time initialization.
type Startup = Shared<BoxFuture<'static, Result<(), Arc<BoxError>>>>;

/// A GraphQL endpoint for Lambda. Create one per container and reuse it for every invocation.
pub struct Adapter<E: GraphQLEngine> {
    engine: Arc<E>,
    config: AdapterConfig,
    /// The request-independent part of CORS headers, never modified after construction
    base_cors: NormalizedHeaders,
    started: Startup,
    uploads: Box<dyn UploadProcessor>,
    tool_renderer: Box<dyn ToolPageRenderer>,
}

impl<E: GraphQLEngine> Adapter<E> {
    /// Starts the engine initialization right away if called inside a tokio runtime,
    /// otherwise it starts with the first request that needs the engine.
    pub fn new(engine: E, config: AdapterConfig) -> Self {
        let engine = Arc::new(engine);

        let started = {
            let engine = engine.clone();
            async move {
                info!("Starting GraphQL engine");
                engine.start().await.map_err(|e| {
                    error!("GraphQL engine failed to start: {}", e);
                    Arc::new(e)
                })
            }
            .boxed()
            .shared()
        };

        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(started.clone());
        }

        Adapter {
            engine,
            base_cors: cors::base_headers(config.cors.as_ref()),
            config,
            started,
            uploads: Box::new(MultipartProcessor),
            tool_renderer: Box::new(JuniperPages),
        }
    }

    /// Replaces the default multipart processor.
    pub fn with_upload_processor<U: UploadProcessor + 'static>(mut self, processor: U) -> Self {
        self.uploads = Box::new(processor);
        self
    }

    /// Replaces the default tool page renderer.
    pub fn with_tool_renderer<R: ToolPageRenderer + 'static>(mut self, renderer: R) -> Self {
        self.tool_renderer = Box::new(renderer);
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Handles the event and returns the response directly.
    pub async fn handle(&self, event: HttpEvent, ctx: &mut InvocationContext) -> Result<HttpResponse, AdapterError> {
        self.handle_event(event, ctx, false).await
    }

    /// Handles the event and delivers the result through `callback`.
    ///
    /// Unless the adapter is in async mode, the host is told not to wait for background work
    /// once the callback is called.
    pub async fn handle_with_callback<F>(&self, event: HttpEvent, ctx: &mut InvocationContext, callback: F)
    where
        F: FnOnce(Result<HttpResponse, AdapterError>),
    {
        if !self.config.async_mode {
            ctx.callback_waits_for_empty_event_loop = false;
        }

        let res = self.handle_event(event, ctx, true).await;
        callback(res);
    }

    async fn handle_event(
        &self,
        mut event: HttpEvent,
        ctx: &mut InvocationContext,
        callback_mode: bool,
    ) -> Result<HttpResponse, AdapterError> {
        let method = event.method();
        info!("{} {}", method, event.path);

        let cors_headers = cors::request_headers(&self.base_cors, self.config.cors.as_ref(), &event.normalized_headers());

        if method == "OPTIONS" {
            if callback_mode {
                ctx.callback_waits_for_empty_event_loop = false;
            }
            return Ok(http_options_response(&event, cors_headers));
        }

        if let Some(tool_page) = &self.config.tool_page {
            if method == "GET" && accepts_html(&event.headers) {
                info!("Serving the query tool page");
                // the stage-prefixed path is the one the browser sees, e.g. `/prod/graphql`
                let endpoint = event
                    .request_context
                    .as_ref()
                    .and_then(|v| v.path.as_deref())
                    .unwrap_or(&event.path);
                let html = self.tool_renderer.render(RenderOptions {
                    endpoint,
                    config: tool_page,
                });

                let mut headers = NormalizedHeaders::new();
                headers.set("Content-Type", "text/html");
                headers.extend(&cors_headers);
                return Ok(HttpResponse::new(200, html).with_headers(headers));
            }
        }

        self.started.clone().await.map_err(AdapterError::Startup)?;

        self.process_uploads(&mut event).await?;

        let options = self
            .engine
            .build_options(&event, ctx)
            .await
            .map_err(AdapterError::Internal)?;

        let mut resp = bridge::graphql_lambda(self.engine.as_ref(), &event, &options).await?;

        // CORS go last and replace same-named headers set by the engine
        resp.headers.extend(&cors_headers);
        debug!("Response: {:?}", resp);

        Ok(resp)
    }

    /// Replaces a `multipart/form-data` body with the structured output of the upload processor.
    /// Any other body is left untouched.
    async fn process_uploads(&self, event: &mut HttpEvent) -> Result<(), AdapterError> {
        let config = match &self.config.uploads {
            Some(v) => v,
            None => return Ok(()),
        };

        let content_type = match event.normalized_headers().get("content-type") {
            Some(v) if v.starts_with("multipart/form-data") => v.to_owned(),
            _ => return Ok(()),
        };

        let raw = match &event.body {
            Some(EventBody::Text(v)) => v,
            _ => return Ok(()),
        };

        let bytes = if event.is_base64_encoded {
            base64::decode(raw).map_err(|e| self.upload_error(&e))?
        } else {
            raw.as_bytes().to_vec()
        };
        info!("Multipart body: {} bytes", bytes.len());

        let (pusher, stream) = byte_channel();
        pusher.push(bytes);
        pusher.end();

        match self.uploads.process(stream, &content_type, config).await {
            Ok(v) => {
                event.body = Some(EventBody::Structured(v));
                Ok(())
            }
            Err(e) => Err(self.upload_error(&e)),
        }
    }

    /// Passes the error through the engine's formatter so it gets the same treatment as GraphQL errors.
    fn upload_error(&self, e: &(dyn std::error::Error + Send + Sync)) -> AdapterError {
        error!("Upload processing failed: {}", e);
        AdapterError::Upload(self.engine.format_errors(
            &[e],
            FormatOptions {
                debug: self.config.debug,
            },
        ))
    }
}

/// Only `Accept` and `accept` are checked, other spellings of the header name are ignored.
fn accepts_html(raw_headers: &HashMap<String, String>) -> bool {
    raw_headers
        .get("Accept")
        .or_else(|| raw_headers.get("accept"))
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}
