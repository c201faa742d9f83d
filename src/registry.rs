//! Process-wide table of live sessions, keyed by (user, session id).

use crate::clock::Clock;
use crate::session::Session;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Identifies one session: the owning user plus a session-scoped id
/// the client mints on first connect and presents on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user: String,
    pub guid: String,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            guid: guid.into(),
        }
    }
}

/// The registry of every live `Session`, shared across the gateway's
/// connection handlers and its background reaper/ticker tasks.
pub struct Registry {
    sessions: RwLock<HashMap<SessionKey, Arc<Session>>>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    max_soft_entries: usize,
}

impl Registry {
    pub fn new(clock: Arc<dyn Clock>, lock_timeout: Duration, max_soft_entries: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            lock_timeout,
            max_soft_entries,
        }
    }

    /// Returns the session for `key`, creating it on first use.
    ///
    /// Double-checked locking: an optimistic read-lock lookup avoids
    /// taking the write lock on the common path where the session
    /// already exists, then a second check under the write lock guards
    /// against two callers racing to create the same key.
    pub async fn lookup_or_create(&self, key: SessionKey) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(&key) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Session::new(self.clock.clone(), self.lock_timeout, self.max_soft_entries)))
            .clone()
    }

    /// Looks up a session without creating one.
    pub async fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Removes a session unconditionally, e.g. on explicit logout.
    pub async fn remove(&self, key: &SessionKey) {
        self.sessions.write().await.remove(key);
    }

    /// Removes every session that is detached, empty, and past its
    /// deadline by more than `grace`. Meant to run periodically from a
    /// background task.
    pub async fn reap(&self, grace: Duration) {
        let candidates: Vec<SessionKey> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(key, _)| key.clone())
            .collect();

        let mut reapable = Vec::new();
        for key in candidates {
            let session = self.sessions.read().await.get(&key).cloned();
            if let Some(session) = session {
                if session.is_reapable(grace).await {
                    reapable.push((key, session));
                }
            }
        }
        if reapable.is_empty() {
            return;
        }

        let mut sessions = self.sessions.write().await;
        for (key, session) in reapable {
            // Re-check under the write lock: the session may have
            // received a new message or attachment since the scan above.
            if session.is_reapable(grace).await {
                sessions.remove(&key);
            }
        }
    }

    /// Enqueues `payload` onto every session whose key satisfies
    /// `predicate`, then flushes each in turn -- the "trivial
    /// broadcaster" the original spec calls out for cross-session
    /// fan-out. No ordering guarantee across sessions, only within each.
    pub async fn broadcast(
        &self,
        predicate: impl Fn(&SessionKey) -> bool,
        payload: Value,
        strong_lifetime: Duration,
        soft_lifetime: Duration,
    ) {
        let targets: Vec<Arc<Session>> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(_, session)| session.clone())
            .collect();
        for session in targets {
            session
                .enqueue(payload.clone(), strong_lifetime, soft_lifetime)
                .await;
            session.flush().await;
        }
    }

    /// Calls `Session::flush` on every currently attached session.
    /// Meant to run from the same background task that drives `tick`.
    pub async fn flush_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            session.flush().await;
        }
    }

    /// Calls `Session::tick` on every session. Meant to run
    /// periodically from a background task, independent of `reap`.
    pub async fn tick_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            session.tick().await;
        }
    }
}
