//! Top-level forwarder: listener + registry + close-all signal handler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use listenbuddy_config::Config;
use listenbuddy_core::defaults::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::listener::Listener;
use crate::pair::RelaySettings;
use crate::registry::ConnectionRegistry;
use crate::signal::spawn_user_signal_handler;
use crate::transport::TcpDialer;

/// A bound forwarder ready to run.
pub struct Forwarder {
    listener: Listener,
    dialer: TcpDialer,
    registry: Arc<ConnectionRegistry>,
    settings: RelaySettings,
    shutdown_timeout: Duration,
}

impl Forwarder {
    /// Bind the listen address from `config`.
    ///
    /// The config is expected to have passed validation.
    pub async fn bind(config: &Config) -> Result<Self, RelayError> {
        let listener =
            Listener::bind(&config.relay.listen, config.tcp.backlog, config.tcp.no_delay).await?;
        let dialer = TcpDialer::new(
            config.relay.speak.clone(),
            Duration::from_secs(config.relay.connect_timeout_secs),
            config.tcp.no_delay,
        );
        Ok(Self {
            listener,
            dialer,
            registry: Arc::new(ConnectionRegistry::new()),
            settings: RelaySettings::from_config(&config.relay),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// The registry tracking this forwarder's relayed connections.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Override how long shutdown waits for relays to drain.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Serve until `shutdown` fires or accepting fails.
    ///
    /// On the way out every remaining relay is closed and given
    /// `shutdown_timeout` to deregister.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), RelayError> {
        let Self {
            listener,
            dialer,
            registry,
            settings,
            shutdown_timeout,
        } = self;

        let handler_stop = shutdown.child_token();
        let signal_task = spawn_user_signal_handler(registry.clone(), handler_stop.clone());

        let result = listener
            .run(dialer, registry.clone(), settings, shutdown)
            .await;

        handler_stop.cancel();
        if let Some(task) = signal_task {
            let _ = task.await;
        }

        let remaining = registry.len();
        if remaining > 0 {
            info!(connections = remaining, "closing remaining connections");
            registry.close_all();
            if !registry.wait_for_empty(shutdown_timeout).await {
                warn!(
                    connections = registry.len(),
                    "connections still open after shutdown timeout"
                );
            }
        }

        result
    }
}

/// Bind and run a forwarder for `config`.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), RelayError> {
    Forwarder::bind(&config).await?.run(shutdown).await
}
