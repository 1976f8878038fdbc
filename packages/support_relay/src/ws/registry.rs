//! Connection Registry
//!
//! Process-wide table of who is online: customers keyed by session id and
//! agents keyed by connection id. Every read and write goes through one lock,
//! and the lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::connection::{ConnectionHandle, ConnectionId};
use super::protocol::SessionId;

#[derive(Debug)]
struct CustomerEntry {
    /// Registration order, used to keep the presence list stable
    seq: u64,
    conn: ConnectionHandle,
}

#[derive(Debug, Default)]
struct RegistryInner {
    customers: HashMap<SessionId, CustomerEntry>,
    agents: HashMap<ConnectionId, ConnectionHandle>,
    next_seq: u64,
}

impl RegistryInner {
    fn customer_ids(&self) -> Vec<SessionId> {
        let mut entries: Vec<(&SessionId, u64)> = self
            .customers
            .iter()
            .map(|(id, entry)| (id, entry.seq))
            .collect();
        entries.sort_by_key(|(_, seq)| *seq);
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    fn agents(&self) -> Vec<ConnectionHandle> {
        self.agents.values().cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A panic elsewhere must not take presence down with it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a customer connection and return its freshly generated id.
    pub fn register_customer(&self, conn: ConnectionHandle) -> SessionId {
        let session_id = SessionId::new(format!("customer_{}", conn.id()));
        let mut inner = self.lock();
        debug_assert!(!inner.agents.contains_key(&conn.id()));
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .customers
            .insert(session_id.clone(), CustomerEntry { seq, conn });
        debug!(session_id = %session_id, customers = inner.customers.len(), "Customer registered");
        session_id
    }

    /// Add an agent. Registering the same connection twice is a no-op.
    pub fn register_agent(&self, conn: ConnectionHandle) {
        let mut inner = self.lock();
        debug_assert!(inner.customers.values().all(|e| e.conn.id() != conn.id()));
        inner.agents.entry(conn.id()).or_insert(conn);
        debug!(agents = inner.agents.len(), "Agent registered");
    }

    /// Returns whether an entry was removed.
    pub fn unregister_customer(&self, session_id: &SessionId) -> bool {
        self.lock().customers.remove(session_id).is_some()
    }

    /// Returns whether an entry was removed.
    pub fn unregister_agent(&self, conn_id: ConnectionId) -> bool {
        self.lock().agents.remove(&conn_id).is_some()
    }

    /// Snapshot of online customers in registration order.
    pub fn customer_ids(&self) -> Vec<SessionId> {
        self.lock().customer_ids()
    }

    pub fn lookup_customer(&self, session_id: &str) -> Option<ConnectionHandle> {
        self.lock()
            .customers
            .get(&SessionId::new(session_id))
            .map(|entry| entry.conn.clone())
    }

    /// Snapshot of the agent set.
    pub fn agents(&self) -> Vec<ConnectionHandle> {
        self.lock().agents()
    }

    /// Run `f` against a snapshot of customers and agents while the lock is
    /// held. `f` must not block; queueing with `ConnectionHandle::send` is fine.
    pub fn with_presence<R>(&self, f: impl FnOnce(Vec<SessionId>, &[ConnectionHandle]) -> R) -> R {
        let inner = self.lock();
        let agents = inner.agents();
        f(inner.customer_ids(), &agents)
    }

    /// `(customers, agents)` currently online.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.customers.len(), inner.agents.len())
    }
}
