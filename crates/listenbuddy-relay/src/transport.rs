//! Outbound dialing abstraction.
//!
//! The relay pair only needs "give me a fresh stream to the target". Keeping
//! that behind a trait lets the relay engine run over plain TCP in
//! production and over in-memory streams in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::RelayError;

/// Marker trait for streams usable by the relay engine.
pub trait RelayStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> RelayStream for T {}

/// Opens the outbound ("speaking") side of a relay.
pub trait Dialer: Clone + Send + Sync + 'static {
    /// The stream type produced by this dialer.
    type Stream: RelayStream;

    /// Address label of the target, for handles and logs.
    fn target(&self) -> &str;

    /// Connect to the target.
    fn dial(&self) -> Pin<Box<dyn Future<Output = Result<Self::Stream, RelayError>> + Send + '_>>;
}

/// Plain TCP dialer with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    target: String,
    connect_timeout: Duration,
    no_delay: bool,
}

impl TcpDialer {
    pub fn new(target: impl Into<String>, connect_timeout: Duration, no_delay: bool) -> Self {
        Self {
            target: target.into(),
            connect_timeout,
            no_delay,
        }
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn target(&self) -> &str {
        &self.target
    }

    fn dial(&self) -> Pin<Box<dyn Future<Output = Result<TcpStream, RelayError>> + Send + '_>> {
        Box::pin(async move {
            let stream = tokio::time::timeout(
                self.connect_timeout,
                TcpStream::connect(self.target.as_str()),
            )
            .await
            .map_err(|_| RelayError::ConnectTimeout(self.target.clone()))?
            .map_err(|source| RelayError::Dial {
                target: self.target.clone(),
                source,
            })?;

            if self.no_delay
                && let Err(e) = stream.set_nodelay(true)
            {
                debug!(error = %e, "failed to set TCP_NODELAY on outbound");
            }
            Ok(stream)
        })
    }
}
