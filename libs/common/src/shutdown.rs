//! Graceful shutdown utilities

use tracing::{info, warn};

/// Which signal ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Wait for Ctrl+C, or SIGTERM on Unix
///
/// ```ignore
/// tokio::select! {
///     signal = common::shutdown::wait_for_shutdown() => {
///         info!("{:?} received", signal);
///     }
///     // ... other tasks
/// }
/// ```
pub async fn wait_for_shutdown() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), only Ctrl+C will stop", e);
                None
            },
        };

        let received = tokio::select! {
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = async {
                match term_signal.as_mut() {
                    Some(sig) => {
                        sig.recv().await;
                    },
                    None => std::future::pending::<()>().await,
                }
            } => ShutdownSignal::Terminate,
        };
        info!("Shutdown signal: {:?}", received);
        received
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler failed: {}", e);
        }
        info!("Shutdown signal: Interrupt");
        ShutdownSignal::Interrupt
    }
}
