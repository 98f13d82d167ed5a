//! Signal handling: SIGUSR1 closes every relayed connection, SIGINT/SIGTERM
//! stop the process.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

/// A source of close-all requests.
pub trait CloseAllTrigger: Send + 'static {
    /// Wait for the next request. `None` means no more can arrive.
    fn triggered(&mut self) -> Pin<Box<dyn Future<Output = Option<()>> + Send + '_>>;
}

impl CloseAllTrigger for mpsc::Receiver<()> {
    fn triggered(&mut self) -> Pin<Box<dyn Future<Output = Option<()>> + Send + '_>> {
        Box::pin(self.recv())
    }
}

#[cfg(unix)]
impl CloseAllTrigger for tokio::signal::unix::Signal {
    fn triggered(&mut self) -> Pin<Box<dyn Future<Output = Option<()>> + Send + '_>> {
        Box::pin(self.recv())
    }
}

/// Run a close-all pass on `registry` for every request from `trigger`.
///
/// Returns when `shutdown` fires or the trigger source is exhausted.
pub async fn drive_close_all<T: CloseAllTrigger>(
    mut trigger: T,
    source: &'static str,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            event = trigger.triggered() => {
                if event.is_none() {
                    debug!(source, "close-all trigger source ended");
                    return;
                }
                let closed = registry.close_all();
                info!(source, closed, "closing all relayed connections");
            }
        }
    }
}

/// Install the SIGUSR1 handler and spawn its task.
///
/// The signal is registered before this returns, so a SIGUSR1 sent right
/// after is not lost. Returns `None` if the handler could not be installed
/// or the platform has no SIGUSR1; the forwarder keeps running either way.
pub fn spawn_user_signal_handler(
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::user_defined1()) {
            Ok(sig) => Some(tokio::spawn(drive_close_all(
                sig, "SIGUSR1", registry, shutdown,
            ))),
            Err(e) => {
                warn!("failed to install SIGUSR1 handler: {}, close-all disabled", e);
                None
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (registry, shutdown);
        warn!("SIGUSR1 is not available on this platform, close-all disabled");
        None
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
