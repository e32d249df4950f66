//! Job queue, worker pool, and automation scheduling.

pub mod automation;
pub mod config;
pub mod error;
pub mod pool;
pub mod queue;
pub mod runtime;
pub mod scheduler;

pub use automation::{AutomationController, AutomationSnapshot, ConfigUpdate};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use queue::JobQueue;
pub use runtime::{connect_store, Background, Services};

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
