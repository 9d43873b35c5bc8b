use std::sync::Arc;

use docqa_api::AppContext;
use docqa_core::config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Config::load()?.settings().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;
    let ctx = Arc::new(AppContext::new(&settings.server));

    // Bound before indexing; /health answers "starting" until the pipelines are set.
    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    let server = tokio::spawn(docqa_api::serve(listener, ctx.clone(), shutdown_signal()));

    let pipelines = match docqa_rag::build_from_settings(&settings).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "startup failed");
            server.abort();
            return Err(e);
        }
    };
    let chunks = pipelines.chunks;
    ctx.set_ready(pipelines);
    info!(chunks, "ready to answer questions");

    server.await??;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
