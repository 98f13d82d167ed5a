//! Connection handles tracked by the registry.
//!
//! The byte streams themselves are owned by the copy tasks of a relay pair.
//! A [`ConnHandle`] is the shared, closable identity of one of those
//! streams: closing it makes every copy task touching the stream stop and
//! drop its half, which closes the socket.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub fn next() -> Self {
        Self(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which end of a relay pair a connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Accepted from a client ("hearing").
    Inbound,
    /// Dialed to the target ("speaking").
    Outbound,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Inbound => f.write_str("inbound"),
            Side::Outbound => f.write_str("outbound"),
        }
    }
}

/// Something the registry can close in bulk.
pub trait Closable: Send + Sync + 'static {
    fn id(&self) -> ConnId;

    /// Close the connection. Must be idempotent.
    fn close(&self) -> io::Result<()>;
}

/// Closable identity of one relayed connection.
#[derive(Debug)]
pub struct ConnHandle {
    id: ConnId,
    side: Side,
    peer: String,
    closer: CancellationToken,
}

impl ConnHandle {
    pub fn new(side: Side, peer: impl Into<String>) -> Self {
        Self {
            id: ConnId::next(),
            side,
            peer: peer.into(),
            closer: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Remote address (inbound) or target address (outbound).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Ask every copy task using this connection to stop.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closer.cancelled().await;
    }
}

impl Closable for ConnHandle {
    fn id(&self) -> ConnId {
        self.id
    }

    fn close(&self) -> io::Result<()> {
        ConnHandle::close(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ids_are_unique() {
        let a = ConnHandle::new(Side::Inbound, "127.0.0.1:5000");
        let b = ConnHandle::new(Side::Outbound, "localhost:80");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.side(), Side::Inbound);
        assert_eq!(b.peer(), "localhost:80");
    }

    #[tokio::test]
    async fn close_wakes_waiters_and_is_idempotent() {
        let handle = std::sync::Arc::new(ConnHandle::new(Side::Inbound, "peer"));
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.closed().await })
        };

        assert!(!handle.is_closed());
        Closable::close(handle.as_ref()).unwrap();
        Closable::close(handle.as_ref()).unwrap();
        assert!(handle.is_closed());

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[test]
    fn display_formats() {
        assert_eq!(Side::Inbound.to_string(), "inbound");
        assert_eq!(Side::Outbound.to_string(), "outbound");
        assert!(ConnId::next().to_string().starts_with('#'));
    }
}
