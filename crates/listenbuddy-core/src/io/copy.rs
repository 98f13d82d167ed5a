//! One-directional byte copy with strict write accounting.
//!
//! A chunk read from the source is handed to a [`ChunkSink`] in a single
//! call. The sink reports how many bytes it took; anything short of the full
//! chunk ends the direction with [`CopyError::ShortWrite`]. The remainder is
//! never retried.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{ERROR_IO, ERROR_SHORT_WRITE};

/// Why a copy direction stopped before reaching end-of-stream.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("read: {0}")]
    Read(#[source] io::Error),
    #[error("write: {0}")]
    Write(#[source] io::Error),
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

impl CopyError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            CopyError::Read(_) | CopyError::Write(_) => ERROR_IO,
            CopyError::ShortWrite { .. } => ERROR_SHORT_WRITE,
        }
    }

    /// Whether the failure only reflects the connection having been closed
    /// underneath the copy (usually by the other direction's teardown).
    pub fn is_closed_conn(&self) -> bool {
        match self {
            CopyError::Read(e) | CopyError::Write(e) => is_closed_conn_error(e),
            CopyError::ShortWrite { .. } => false,
        }
    }
}

/// Classify errors that routinely follow a concurrent close of the stream.
pub fn is_closed_conn_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    ) || err.to_string().contains("closed")
}

/// Destination of one copy direction.
///
/// `write_chunk` is called once per chunk and returns how many bytes were
/// transmitted. Returning less than `chunk.len()` is treated as a fatal
/// short write by [`copy_direction`].
pub trait ChunkSink: Send {
    /// Transmit one chunk.
    fn write_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>>;

    /// Signal that no more data will be written (half-close).
    fn close_write(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;
}

/// [`ChunkSink`] over any async writer.
///
/// The writer's own partial-write behaviour is absorbed here: a chunk is
/// either written and flushed completely or the call fails.
pub struct StreamSink<W> {
    inner: W,
}

impl<W> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for StreamSink<W> {
    fn write_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            self.inner.write_all(chunk).await?;
            self.inner.flush().await?;
            Ok(chunk.len())
        })
    }

    fn close_write(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(self.inner.shutdown())
    }
}

/// Copy from `reader` into `sink` until end-of-stream.
///
/// Returns `Ok(())` when the reader reports end-of-stream (a read of zero
/// bytes into the non-empty `buf`). Bytes successfully written are added to
/// `copied` as they go, so the count survives both errors and cancellation
/// of the returned future.
pub async fn copy_direction<R, S>(
    reader: &mut R,
    sink: &mut S,
    buf: &mut [u8],
    copied: &mut u64,
) -> Result<(), CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    S: ChunkSink + ?Sized,
{
    debug_assert!(!buf.is_empty(), "copy buffer must not be empty");
    loop {
        let n = reader.read(buf).await.map_err(CopyError::Read)?;
        if n == 0 {
            return Ok(());
        }
        let written = sink
            .write_chunk(&buf[..n])
            .await
            .map_err(CopyError::Write)?;
        if written != n {
            return Err(CopyError::ShortWrite {
                written,
                expected: n,
            });
        }
        *copied += n as u64;
    }
}
