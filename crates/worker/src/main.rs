use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prospector_worker::{connect_store, shutdown_signal, Services, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prospector_worker=debug,prospector_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        workers_per_type = config.workers_per_type,
        claim_timeout_secs = config.claim_timeout.as_secs(),
        "Loaded worker configuration",
    );

    let store = connect_store(config.database_url.as_deref())
        .await
        .expect("Failed to open the store");

    let services = Services::new(store, &config);
    let background = services
        .start_background(&config)
        .await
        .expect("Failed to start background services");

    shutdown_signal().await;

    // Let in-flight adapter calls run out before giving up on the tasks.
    background
        .shutdown(config.adapter_timeout + Duration::from_secs(5))
        .await;
    tracing::info!("Worker stopped");
}
