use std::sync::Arc;

use delivery_admin::api;
use delivery_admin::backend::MemoryBackend;
use delivery_admin::config::Config;
use delivery_admin::error::AppError;
use delivery_admin::observability::logging;
use delivery_admin::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init(&config);

    let backend = Arc::new(MemoryBackend::new(config.event_buffer_size));
    let (app_state, changes_rx) = AppState::new(backend, &config);
    let shared_state = Arc::new(app_state);

    let _dispatcher = shared_state.dispatcher.spawn(changes_rx);
    shared_state.dashboard.reload().await;

    let app = api::rest::router(shared_state.clone(), &config.static_dir);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        environment = ?config.environment,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
