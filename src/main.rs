use lambda_runtime::{service_fn, Error, LambdaEvent};
use std::sync::Arc;
use stm_gql_lambda::{Adapter, AdapterConfig, HttpEvent, HttpResponse, InvocationContext, JuniperEngine};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // init the logger with the specified level
    let tsub = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false);
    // time is not needed in CloudWatch, but is useful in console
    #[cfg(not(debug_assertions))]
    let tsub = tsub.without_time();
    tsub.init();

    // the config and the engine are shared by all invocations in this container
    let config = AdapterConfig::from_env()?;
    info!("Async mode: {}", config.async_mode);
    let adapter = Arc::new(Adapter::new(JuniperEngine::new(), config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<HttpEvent>| {
        let adapter = adapter.clone();
        async move { handler(event, adapter.as_ref()).await }
    }))
    .await
}

async fn handler(event: LambdaEvent<HttpEvent>, adapter: &Adapter<JuniperEngine>) -> Result<HttpResponse, Error> {
    let mut ctx = InvocationContext::from(&event.context);

    if adapter.config().async_mode {
        return Ok(adapter.handle(event.payload, &mut ctx).await?);
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    adapter
        .handle_with_callback(event.payload, &mut ctx, |res| {
            if tx.send(res).is_err() {
                debug!("Response receiver is gone");
            }
        })
        .await;
    debug!("Wait for empty event loop: {}", ctx.callback_waits_for_empty_event_loop);

    Ok(rx.await??)
}
