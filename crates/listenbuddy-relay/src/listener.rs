//! Accept loop: one relay pair per accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::RelayError;
use crate::pair::{RelaySettings, serve_connection};
use crate::registry::ConnectionRegistry;
use crate::transport::Dialer;
use crate::util::{create_listener, resolve_listen_addr};

/// Bound listening socket.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    no_delay: bool,
}

impl Listener {
    /// Resolve and bind `addr` (`host:port` or `:port`).
    pub async fn bind(addr: &str, backlog: u32, no_delay: bool) -> Result<Self, RelayError> {
        let resolved = resolve_listen_addr(addr).await?;
        let inner = create_listener(resolved, backlog).map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            inner,
            local_addr,
            no_delay,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires or accept fails.
    ///
    /// Every accepted connection is served on its own task. An accept error
    /// is fatal: it is logged and returned, and the caller is expected to
    /// exit. Relays already running are left to the caller.
    pub async fn run<D: Dialer>(
        self,
        dialer: D,
        registry: Arc<ConnectionRegistry>,
        settings: RelaySettings,
        shutdown: CancellationToken,
    ) -> Result<(), RelayError> {
        let settings = Arc::new(settings);
        info!(
            listen = %self.local_addr,
            speak = dialer.target(),
            close_mode = %settings.close_mode,
            "listening"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(listen = %self.local_addr, "listener shutting down");
                    return Ok(());
                }
                accept_result = self.inner.accept() => {
                    let (stream, peer_addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(listen = %self.local_addr, error = %e, "accept failed");
                            return Err(RelayError::Accept(e));
                        }
                    };

                    if self.no_delay
                        && let Err(e) = stream.set_nodelay(true)
                    {
                        debug!(error = %e, "failed to set TCP_NODELAY on inbound");
                    }
                    debug!("connection accepted");

                    let dialer = dialer.clone();
                    let registry = registry.clone();
                    let settings = settings.clone();
                    tokio::spawn(
                        async move {
                            if let Err(e) = serve_connection(
                                stream,
                                peer_addr.to_string(),
                                &dialer,
                                &registry,
                                &settings,
                            )
                            .await
                            {
                                warn!(error = %e, error_type = e.error_type(), "dial failed, inbound closed");
                            }
                        }
                        .instrument(info_span!("relay", peer = %peer_addr)),
                    );
                }
            }
        }
    }
}
