use std::path::PathBuf;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filedeck_server::config::ServerConfig;
use filedeck_server::routes;
use filedeck_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("filedeck-server starting");

    // Config file path as first argument, environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "Loading config file");
            ServerConfig::load(&path)?
        }
        None => ServerConfig::from_env()?,
    };

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        facts = state.facts.is_some(),
        hosted_blobs = state.hosted.is_some(),
        "App state ready"
    );

    let app = routes::build_router(state)
        .layer(routes::cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(address = %config.listen_addr, "Listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("filedeck-server shut down");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
