use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prospector_api::config::ServerConfig;
use prospector_api::router::build_app_router;
use prospector_api::state::AppState;
use prospector_worker::{connect_store, shutdown_signal, Services, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "prospector_api=debug,prospector_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        run_workers = config.run_workers,
        "Loaded server configuration",
    );

    // --- Store ---
    let store = connect_store(worker_config.database_url.as_deref())
        .await
        .expect("Failed to open the store");

    // --- Services ---
    let services = Services::new(store, &worker_config);
    let background = if config.run_workers {
        Some(
            services
                .start_background(&worker_config)
                .await
                .expect("Failed to start background services"),
        )
    } else {
        None
    };

    // --- Router ---
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let state = AppState::new(config.clone(), &services);
    let app = build_app_router(state, &config);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    if let Some(background) = background {
        background.shutdown(shutdown_timeout).await;
    }
    tracing::info!("Graceful shutdown complete");
}
