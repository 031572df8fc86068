use std::sync::Arc;

use crate::{
    config::Config,
    content::{ContentError, PrismicClient},
    routes::{router, AppState},
};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("could not load templates: {0}")]
    Templates(#[from] tera::Error),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: Config) -> Result<(), ServeError> {
    let client = PrismicClient::from_config(&config.content)?;
    tracing::info!(endpoint = %client.endpoint(), "content API");

    let state = AppState::new(Arc::new(client), &config)?;

    if config.render.prerender {
        match state.prerender().await {
            Ok(count) => tracing::info!(count, "prerendered posts"),
            Err(err) => tracing::warn!(error = %err, "prerender failed, pages will render on demand"),
        }
    }

    let listener = tokio::net::TcpListener::bind(config.net.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => tracing::error!(error = %err, "could not listen for ctrl-c"),
    }
}
