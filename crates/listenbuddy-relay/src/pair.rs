//! Relay pair: one accepted connection bridged to one dialed connection.
//!
//! A pair registers both connections, then runs two copy tasks:
//! upstream (inbound → outbound) and downstream (outbound → inbound).
//! Each task also watches both handles, so closing either handle (from the
//! pair itself or from a registry-wide close) stops both directions.
//!
//! Teardown depends on [`CloseMode`]:
//! - `Full`: the first direction to stop closes both handles.
//! - `Half`: a direction that reaches end-of-stream shuts down its
//!   destination's write side and lets the other direction drain. Errors
//!   still close both handles.
//!
//! Both tasks are joined before the handles are deregistered.

use std::fmt;
use std::sync::Arc;

use listenbuddy_config::{CloseMode, RelayConfig};
use listenbuddy_core::defaults::DEFAULT_RELAY_BUFFER_SIZE;
use listenbuddy_core::io::{ChunkSink, CopyError, StreamSink, copy_direction};
use tokio::io::AsyncRead;
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use crate::error::RelayError;
use crate::handle::{ConnHandle, ConnId, Side};
use crate::registry::ConnectionRegistry;
use crate::transport::{Dialer, RelayStream};

/// Per-relay behaviour derived from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub buffer_size: usize,
    pub close_mode: CloseMode,
    /// Report copy errors at warn level instead of debug.
    pub log_copy_errors: bool,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            close_mode: config.close_mode,
            log_copy_errors: config.verbose,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            close_mode: CloseMode::Full,
            log_copy_errors: false,
        }
    }
}

/// Copy direction within a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Inbound → outbound.
    Upstream,
    /// Outbound → inbound.
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => f.write_str("upstream"),
            Direction::Downstream => f.write_str("downstream"),
        }
    }
}

/// How a copy direction ended.
#[derive(Debug)]
pub enum DirectionEnd {
    /// Source reached end-of-stream.
    Eof,
    /// One of the pair's handles was closed.
    Closed,
    /// Read error, write error, or short write.
    Failed(CopyError),
    /// The copy task panicked or was cancelled.
    Aborted(String),
}

impl DirectionEnd {
    pub fn is_eof(&self) -> bool {
        matches!(self, DirectionEnd::Eof)
    }
}

#[derive(Debug)]
pub struct DirectionReport {
    pub direction: Direction,
    /// Bytes written to the destination.
    pub bytes: u64,
    pub end: DirectionEnd,
}

/// Outcome of a finished relay.
#[derive(Debug)]
pub struct RelayReport {
    pub upstream: DirectionReport,
    pub downstream: DirectionReport,
}

impl RelayReport {
    fn log(&self, log_copy_errors: bool) {
        log_direction_end(&self.upstream, log_copy_errors);
        log_direction_end(&self.downstream, log_copy_errors);
        debug!(
            bytes_up = self.upstream.bytes,
            bytes_down = self.downstream.bytes,
            "relay finished"
        );
    }
}

fn log_direction_end(report: &DirectionReport, log_copy_errors: bool) {
    let direction = report.direction;
    match &report.end {
        DirectionEnd::Eof => debug!(%direction, bytes = report.bytes, "end of stream"),
        DirectionEnd::Closed => debug!(%direction, bytes = report.bytes, "connection closed"),
        DirectionEnd::Failed(e) if e.is_closed_conn() => {
            debug!(%direction, error = %e, "copy stopped on closed connection")
        }
        DirectionEnd::Failed(e) if log_copy_errors => {
            warn!(%direction, error = %e, error_type = e.error_type(), "copy failed")
        }
        DirectionEnd::Failed(e) => {
            debug!(%direction, error = %e, error_type = e.error_type(), "copy failed")
        }
        DirectionEnd::Aborted(reason) => error!(%direction, error = %reason, "copy task aborted"),
    }
}

/// Removes both handles from the registry when dropped.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    ids: [ConnId; 2],
}

impl Drop for Registration {
    fn drop(&mut self) {
        for id in self.ids {
            self.registry.remove(id);
        }
    }
}

/// Both handles of a pair, watched by each copy task.
#[derive(Clone)]
struct Watch {
    hearing: Arc<ConnHandle>,
    speaking: Arc<ConnHandle>,
}

impl Watch {
    fn close_both(&self) {
        self.hearing.close();
        self.speaking.close();
    }
}

/// An accepted connection and its dialed counterpart.
pub struct RelayPair<I, O> {
    hearing: I,
    speaking: O,
    watch: Watch,
}

impl<I: RelayStream, O: RelayStream> RelayPair<I, O> {
    pub fn new(
        hearing: I,
        hearing_peer: impl Into<String>,
        speaking: O,
        speaking_peer: impl Into<String>,
    ) -> Self {
        Self {
            hearing,
            speaking,
            watch: Watch {
                hearing: Arc::new(ConnHandle::new(Side::Inbound, hearing_peer)),
                speaking: Arc::new(ConnHandle::new(Side::Outbound, speaking_peer)),
            },
        }
    }

    pub fn hearing_handle(&self) -> &Arc<ConnHandle> {
        &self.watch.hearing
    }

    pub fn speaking_handle(&self) -> &Arc<ConnHandle> {
        &self.watch.speaking
    }

    /// Relay until both directions have stopped, then deregister.
    pub async fn run(
        self,
        registry: &Arc<ConnectionRegistry>,
        settings: &RelaySettings,
    ) -> RelayReport {
        let Self {
            hearing,
            speaking,
            watch,
        } = self;

        registry.add(watch.hearing.clone());
        registry.add(watch.speaking.clone());
        let registration = Registration {
            registry: registry.clone(),
            ids: [watch.hearing.id(), watch.speaking.id()],
        };

        let (hearing_r, hearing_w) = tokio::io::split(hearing);
        let (speaking_r, speaking_w) = tokio::io::split(speaking);

        let mut upstream = tokio::spawn(pump(
            Direction::Upstream,
            hearing_r,
            StreamSink::new(speaking_w),
            watch.clone(),
            settings.buffer_size,
            settings.close_mode,
        ));
        let mut downstream = tokio::spawn(pump(
            Direction::Downstream,
            speaking_r,
            StreamSink::new(hearing_w),
            watch.clone(),
            settings.buffer_size,
            settings.close_mode,
        ));

        let first = tokio::select! {
            res = &mut upstream => settle(Direction::Upstream, res),
            res = &mut downstream => settle(Direction::Downstream, res),
        };

        if settings.close_mode == CloseMode::Full || !first.end.is_eof() {
            watch.close_both();
        }

        let second = match first.direction {
            Direction::Upstream => settle(Direction::Downstream, downstream.await),
            Direction::Downstream => settle(Direction::Upstream, upstream.await),
        };

        // Both tasks have exited and dropped their stream halves.
        watch.close_both();
        drop(registration);

        let (upstream, downstream) = match first.direction {
            Direction::Upstream => (first, second),
            Direction::Downstream => (second, first),
        };
        let report = RelayReport {
            upstream,
            downstream,
        };
        report.log(settings.log_copy_errors);
        report
    }
}

fn settle(direction: Direction, joined: Result<DirectionReport, JoinError>) -> DirectionReport {
    joined.unwrap_or_else(|e| DirectionReport {
        direction,
        bytes: 0,
        end: DirectionEnd::Aborted(e.to_string()),
    })
}

/// One copy task: `reader` → `sink` until end-of-stream, failure, or close.
async fn pump<R, S>(
    direction: Direction,
    mut reader: R,
    mut sink: S,
    watch: Watch,
    buffer_size: usize,
    close_mode: CloseMode,
) -> DirectionReport
where
    R: AsyncRead + Unpin + Send,
    S: ChunkSink,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut bytes = 0u64;

    let end = tokio::select! {
        biased;
        _ = watch.hearing.closed() => DirectionEnd::Closed,
        _ = watch.speaking.closed() => DirectionEnd::Closed,
        res = copy_direction(&mut reader, &mut sink, &mut buf, &mut bytes) => match res {
            Ok(()) => DirectionEnd::Eof,
            Err(e) => DirectionEnd::Failed(e),
        },
    };

    if end.is_eof()
        && close_mode == CloseMode::Half
        && let Err(e) = sink.close_write().await
    {
        debug!(%direction, error = %e, "half-close failed");
    }

    DirectionReport {
        direction,
        bytes,
        end,
    }
}

/// Dial the target for an accepted connection and relay until teardown.
///
/// On dial failure the inbound connection is dropped (closed) and nothing
/// is registered.
pub async fn serve_connection<I, D>(
    hearing: I,
    peer: impl Into<String>,
    dialer: &D,
    registry: &Arc<ConnectionRegistry>,
    settings: &RelaySettings,
) -> Result<RelayReport, RelayError>
where
    I: RelayStream,
    D: Dialer,
{
    let speaking = match dialer.dial().await {
        Ok(stream) => stream,
        Err(e) => {
            drop(hearing);
            return Err(e);
        }
    };
    debug!(speak = dialer.target(), "target connected");

    let pair = RelayPair::new(hearing, peer, speaking, dialer.target());
    Ok(pair.run(registry, settings).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::io;
    use std::pin::Pin;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    use crate::test_util::capture_logs;

    const STEP: Duration = Duration::from_secs(2);

    fn spawn_pair(
        pair: RelayPair<DuplexStream, DuplexStream>,
        registry: &Arc<ConnectionRegistry>,
        settings: RelaySettings,
    ) -> tokio::task::JoinHandle<RelayReport> {
        let registry = registry.clone();
        tokio::spawn(async move { pair.run(&registry, &settings).await })
    }

    /// Dialer handing out a single prepared in-memory stream.
    #[derive(Clone)]
    struct DuplexDialer {
        stream: Arc<Mutex<Option<DuplexStream>>>,
    }

    impl Dialer for DuplexDialer {
        type Stream = DuplexStream;

        fn target(&self) -> &str {
            "memory:1"
        }

        fn dial(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<DuplexStream, RelayError>> + Send + '_>> {
            Box::pin(async move {
                self.stream
                    .lock()
                    .take()
                    .ok_or_else(|| RelayError::ConnectTimeout("memory:1".into()))
            })
        }
    }

    #[derive(Clone)]
    struct RefusingDialer;

    impl Dialer for RefusingDialer {
        type Stream = DuplexStream;

        fn target(&self) -> &str {
            "refused:1"
        }

        fn dial(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<DuplexStream, RelayError>> + Send + '_>> {
            Box::pin(async {
                Err(RelayError::Dial {
                    target: "refused:1".into(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                })
            })
        }
    }

    struct TruncatingSink;

    impl ChunkSink for TruncatingSink {
        fn write_chunk<'a>(
            &'a mut self,
            chunk: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>> {
            Box::pin(async move { Ok(chunk.len() / 2) })
        }

        fn close_write(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn relays_both_directions_and_deregisters() {
        let (client, hearing) = duplex(1024);
        let (speaking, mut target) = duplex(1024);
        let registry = Arc::new(ConnectionRegistry::new());

        let pair = RelayPair::new(hearing, "client:1", speaking, "target:1");
        let hearing_id = pair.hearing_handle().id();
        let speaking_id = pair.speaking_handle().id();
        let task = spawn_pair(pair, &registry, RelaySettings::default());

        let (mut client_r, mut client_w) = tokio::io::split(client);
        client_w.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert!(registry.contains(hearing_id));
        assert!(registry.contains(speaking_id));

        target.write_all(b"pong").await.unwrap();
        client_r.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client_r);
        drop(client_w);

        // Full close: the outbound side is closed once inbound hits EOF.
        let n = tokio::time::timeout(STEP, target.read(&mut buf))
            .await
            .expect("outbound not closed")
            .unwrap();
        assert_eq!(n, 0);

        let report = tokio::time::timeout(STEP, task).await.unwrap().unwrap();
        assert!(report.upstream.end.is_eof());
        assert!(matches!(report.downstream.end, DirectionEnd::Closed));
        assert_eq!(report.upstream.bytes, 4);
        assert_eq!(report.downstream.bytes, 4);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn outbound_eof_closes_inbound() {
        let (mut client, hearing) = duplex(1024);
        let (speaking, target) = duplex(1024);
        let registry = Arc::new(ConnectionRegistry::new());

        let task = spawn_pair(
            RelayPair::new(hearing, "client:1", speaking, "target:1"),
            &registry,
            RelaySettings::default(),
        );
        drop(target);

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(STEP, client.read(&mut buf))
            .await
            .expect("inbound not closed")
            .unwrap();
        assert_eq!(n, 0);

        let report = tokio::time::timeout(STEP, task).await.unwrap().unwrap();
        assert!(report.downstream.end.is_eof());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn half_close_drains_in_flight_response() {
        let (client, hearing) = duplex(1024);
        let (speaking, target) = duplex(1024);
        let registry = Arc::new(ConnectionRegistry::new());
        let settings = RelaySettings {
            close_mode: CloseMode::Half,
            ..RelaySettings::default()
        };
        let task = spawn_pair(
            RelayPair::new(hearing, "client:1", speaking, "target:1"),
            &registry,
            settings,
        );

        let (mut client_r, mut client_w) = tokio::io::split(client);
        client_w.write_all(b"request").await.unwrap();
        client_w.shutdown().await.unwrap();

        // Target sees the request followed by end-of-stream, then answers.
        let (mut target_r, mut target_w) = tokio::io::split(target);
        let mut request = Vec::new();
        tokio::time::timeout(STEP, target_r.read_to_end(&mut request))
            .await
            .expect("half-close not propagated")
            .unwrap();
        assert_eq!(request, b"request");

        target_w.write_all(b"response").await.unwrap();
        target_w.shutdown().await.unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(STEP, client_r.read_to_end(&mut response))
            .await
            .expect("response not drained")
            .unwrap();
        assert_eq!(response, b"response");

        let report = tokio::time::timeout(STEP, task).await.unwrap().unwrap();
        assert!(report.upstream.end.is_eof());
        assert!(report.downstream.end.is_eof());
        assert_eq!(report.upstream.bytes, 7);
        assert_eq!(report.downstream.bytes, 8);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn registry_close_all_tears_down_pair() {
        let (mut client, hearing) = duplex(1024);
        let (speaking, mut target) = duplex(1024);
        let registry = Arc::new(ConnectionRegistry::new());
        let task = spawn_pair(
            RelayPair::new(hearing, "client:1", speaking, "target:1"),
            &registry,
            RelaySettings::default(),
        );

        client.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.close_all(), 2);

        let report = tokio::time::timeout(STEP, task).await.unwrap().unwrap();
        assert!(matches!(report.upstream.end, DirectionEnd::Closed));
        assert!(matches!(report.downstream.end, DirectionEnd::Closed));
        assert!(registry.is_empty());

        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        assert_eq!(target.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_write_fails_direction() {
        let (mut src_w, src_r) = duplex(64);
        src_w.write_all(b"truncate me").await.unwrap();

        let watch = Watch {
            hearing: Arc::new(ConnHandle::new(Side::Inbound, "client:1")),
            speaking: Arc::new(ConnHandle::new(Side::Outbound, "target:1")),
        };
        let report = pump(
            Direction::Upstream,
            src_r,
            TruncatingSink,
            watch,
            64,
            CloseMode::Full,
        )
        .await;

        assert_eq!(report.bytes, 0);
        match report.end {
            DirectionEnd::Failed(CopyError::ShortWrite { written, expected }) => {
                assert_eq!(written, 5);
                assert_eq!(expected, 11);
            }
            other => panic!("expected short write, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn serve_connection_relays_through_dialer() {
        let (mut client, hearing) = duplex(1024);
        let (speaking, mut target) = duplex(1024);
        let dialer = DuplexDialer {
            stream: Arc::new(Mutex::new(Some(speaking))),
        };
        let registry = Arc::new(ConnectionRegistry::new());

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                serve_connection(
                    hearing,
                    "client:1",
                    &dialer,
                    &registry,
                    &RelaySettings::default(),
                )
                .await
            })
        };

        client.write_all(b"abc").await.unwrap();
        let mut buf = [0u8; 3];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
        drop(client);

        let report = tokio::time::timeout(STEP, task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.upstream.bytes, 3);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dial_failure_closes_inbound_without_registering() {
        let (mut client, hearing) = duplex(1024);
        let registry = Arc::new(ConnectionRegistry::new());

        let err = serve_connection(
            hearing,
            "client:1",
            &RefusingDialer,
            &registry,
            &RelaySettings::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::Dial { .. }));
        assert!(registry.is_empty());

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    fn failed(error: CopyError) -> DirectionReport {
        DirectionReport {
            direction: Direction::Upstream,
            bytes: 0,
            end: DirectionEnd::Failed(error),
        }
    }

    #[test]
    fn closed_connection_errors_stay_at_debug() {
        let report = failed(CopyError::Write(io::Error::from(io::ErrorKind::BrokenPipe)));
        for log_copy_errors in [true, false] {
            let logs = capture_logs(|| log_direction_end(&report, log_copy_errors));
            assert!(logs.contains("copy stopped on closed connection"), "{logs}");
            assert!(logs.contains("DEBUG"), "{logs}");
            assert!(!logs.contains("WARN"), "{logs}");
        }
    }

    #[test]
    fn copy_errors_warn_only_when_enabled() {
        let short_write = || {
            failed(CopyError::ShortWrite {
                written: 3,
                expected: 8,
            })
        };

        let logs = capture_logs(|| log_direction_end(&short_write(), true));
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("copy failed"), "{logs}");
        assert!(logs.contains("short_write"), "{logs}");

        let logs = capture_logs(|| log_direction_end(&short_write(), false));
        assert!(logs.contains("DEBUG"), "{logs}");
        assert!(logs.contains("copy failed"), "{logs}");
        assert!(!logs.contains("WARN"), "{logs}");
    }
}
