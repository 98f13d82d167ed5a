//! Registry of live relayed connections.
//!
//! Every connection a copy task is reading from or writing to is registered
//! here, so an external trigger can close all of them at once. The registry
//! is an ordinary value shared through `Arc`; independent registries can
//! coexist in one process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::handle::{Closable, ConnHandle, ConnId};

/// Thread-safe set of active connections keyed by identity.
pub struct ConnectionRegistry<H: Closable = ConnHandle> {
    conns: Mutex<HashMap<ConnId, Arc<H>>>,
    drained: Notify,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: Closable> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
            drained: Notify::new(),
        }
    }
}

impl<H: Closable> ConnectionRegistry<H> {
    /// Register a connection. No-op if it is already present.
    ///
    /// Returns `true` if the handle was newly inserted.
    pub fn add(&self, handle: Arc<H>) -> bool {
        let mut conns = self.conns.lock();
        let id = handle.id();
        if conns.contains_key(&id) {
            return false;
        }
        conns.insert(id, handle);
        true
    }

    /// Deregister a connection. No-op if it is absent.
    ///
    /// Returns `true` if the handle was present.
    pub fn remove(&self, id: ConnId) -> bool {
        let mut conns = self.conns.lock();
        let removed = conns.remove(&id).is_some();
        if removed && conns.is_empty() {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Close every registered connection.
    ///
    /// The lock is held for the whole pass. Handles stay registered; they are
    /// removed by their relay once its copy tasks have exited. A failing
    /// close is logged and does not stop the pass.
    ///
    /// Returns the number of handles that were closed successfully.
    pub fn close_all(&self) -> usize {
        let conns = self.conns.lock();
        let mut closed = 0;
        for (id, handle) in conns.iter() {
            match handle.close() {
                Ok(()) => closed += 1,
                Err(e) => warn!(conn = %id, error = %e, "failed to close connection"),
            }
        }
        debug!(closed, total = conns.len(), "close-all pass finished");
        closed
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.conns.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    /// Wait until no connection is registered.
    ///
    /// Returns `false` if connections are still registered after `timeout`.
    pub async fn wait_for_empty(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a concurrent remove
            // cannot slip between the check and the wait.
            notified.as_mut().enable();
            if self.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_empty();
            }
        }
    }
}
