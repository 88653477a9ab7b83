use std::future::Future;
use tracing::{info, warn};

/// Resolves once `signal` fires. If the signal handler cannot be installed
/// the server keeps running and never shuts down gracefully.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "Failed to install Ctrl+C handler; graceful shutdown disabled");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}
