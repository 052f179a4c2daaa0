use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::session::Session;

/// Where sessions live between requests.
///
/// One store is shared by every connection task, so implementations guard
/// their state themselves.
pub trait SessionStore: Send + Sync {
    fn get(&self, token: &str) -> Option<Arc<Session>>;

    fn insert(&self, session: Arc<Session>);

    fn remove(&self, token: &str) -> Option<Arc<Session>>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn get(&self, token: &str) -> Option<Arc<Session>> {
        (**self).get(token)
    }

    fn insert(&self, session: Arc<Session>) {
        (**self).insert(session);
    }

    fn remove(&self, token: &str) -> Option<Arc<Session>> {
        (**self).remove(token)
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    last_access: Instant,
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

/// Idle time after which [`SessionMiddleware::in_memory`] forgets a session
///
/// [`SessionMiddleware::in_memory`]: crate::session::SessionMiddleware::in_memory
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// An in-process store: one map behind one mutex.
///
/// With an idle TTL, a session not accessed for longer than the TTL counts as
/// gone. It is evicted when next looked up, by [`purge_expired`], or by the
/// sweep an [`insert`](SessionStore::insert) runs at most once per TTL.
///
/// [`purge_expired`]: MemorySessionStore::purge_expired
#[derive(Debug)]
pub struct MemorySessionStore {
    entries: Mutex<Entries>,
    ttl: Option<Duration>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// A store whose sessions never expire
    pub fn new() -> Self {
        Self { entries: Mutex::new(Entries { map: HashMap::new(), last_sweep: Instant::now() }), ttl: None }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), ..Self::new() }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    /// Drops every expired session, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.sweep(&mut self.lock(), now)
    }

    fn sweep(&self, entries: &mut Entries, now: Instant) -> usize {
        let before = entries.map.len();
        entries.map.retain(|_, entry| !self.is_expired(entry, now));
        entries.last_sweep = now;

        let purged = before - entries.map.len();
        trace!(purged, "purged expired sessions");
        purged
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| now.saturating_duration_since(entry.last_access) > ttl)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, token: &str) -> Option<Arc<Session>> {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = self.is_expired(entries.map.get(token)?, now);
        if expired {
            trace!("session expired");
            entries.map.remove(token);
            return None;
        }

        let entry = entries.map.get_mut(token)?;
        entry.last_access = now;
        Some(Arc::clone(&entry.session))
    }

    fn insert(&self, session: Arc<Session>) {
        let now = Instant::now();
        let token = session.token().to_owned();
        let mut entries = self.lock();

        if let Some(ttl) = self.ttl
            && now.saturating_duration_since(entries.last_sweep) >= ttl
        {
            self.sweep(&mut entries, now);
        }
        entries.map.insert(token, Entry { session, last_access: now });
    }

    fn remove(&self, token: &str) -> Option<Arc<Session>> {
        self.lock().map.remove(token).map(|entry| entry.session)
    }
}
