// src/exec/remote/pool.rs

//! Bounded LRU cache of remote sessions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::remote::transport::{RemoteSession, RemoteTransport, SessionKey};

/// Pool sizing and probing (the `[remote]` config section).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of cached sessions.
    pub capacity: usize,
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct PooledSession {
    key: SessionKey,
    session: Arc<dyn RemoteSession>,
}

/// Session cache keyed by (host, port, user, credential).
///
/// - A cached session is probed before every reuse; a failed or slow probe
///   discards it and a new one is connected.
/// - At most `capacity` sessions are kept. The least recently used one is
///   closed when a new session would exceed the limit.
/// - [`invalidate`](Self::invalidate) drops a session after the executor saw
///   it fail, leaving any newer session for the key alone.
#[derive(Debug)]
pub struct SessionPool {
    transport: Arc<dyn RemoteTransport>,
    config: PoolConfig,
    /// Front = least recently used.
    sessions: Mutex<VecDeque<PooledSession>>,
}

impl SessionPool {
    pub fn new(transport: Arc<dyn RemoteTransport>, config: PoolConfig) -> Self {
        Self {
            transport,
            config: PoolConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            sessions: Mutex::new(VecDeque::new()),
        }
    }

    /// Get a live session for `key`, reusing a cached one when its probe
    /// passes and connecting otherwise.
    pub async fn acquire(&self, key: &SessionKey) -> Result<Arc<dyn RemoteSession>> {
        if let Some(session) = self.cached(key) {
            match tokio::time::timeout(self.config.probe_timeout, session.probe()).await {
                Ok(Ok(())) => {
                    debug!(host = %key.host, user = %key.user, "reusing cached remote session");
                    return Ok(session);
                }
                Ok(Err(err)) => {
                    warn!(host = %key.host, user = %key.user, error = %err, "cached session failed liveness probe; reconnecting");
                }
                Err(_) => {
                    warn!(host = %key.host, user = %key.user, timeout = ?self.config.probe_timeout, "liveness probe timed out; reconnecting");
                }
            }
            self.discard(key, &session).await;
        }

        let session = self.transport.connect(key).await?;
        info!(host = %key.host, user = %key.user, "remote session established");
        Ok(self.insert(key, session).await)
    }

    /// Drop and close `session` after a run saw it fail.
    ///
    /// Only that exact session is removed. A replacement another caller
    /// connected for the same key stays cached.
    pub async fn invalidate(&self, key: &SessionKey, session: &Arc<dyn RemoteSession>) {
        if self.discard(key, session).await {
            info!(host = %key.host, user = %key.user, "invalidated remote session");
        } else {
            debug!(host = %key.host, user = %key.user, "failed session was already replaced");
        }
    }

    /// Close every cached session.
    pub async fn clear(&self) {
        let drained: Vec<PooledSession> = self.sessions.lock().drain(..).collect();
        for entry in drained {
            entry.session.close().await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().iter().any(|entry| &entry.key == key)
    }

    /// Cached session for `key`, marked most recently used.
    fn cached(&self, key: &SessionKey) -> Option<Arc<dyn RemoteSession>> {
        let mut sessions = self.sessions.lock();
        let pos = sessions.iter().position(|entry| &entry.key == key)?;
        let entry = sessions.remove(pos)?;
        let session = Arc::clone(&entry.session);
        sessions.push_back(entry);
        Some(session)
    }

    /// Remove `session` if it is still the one cached under `key`.
    async fn discard(&self, key: &SessionKey, session: &Arc<dyn RemoteSession>) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock();
            sessions
                .iter()
                .position(|entry| &entry.key == key && Arc::ptr_eq(&entry.session, session))
                .and_then(|pos| sessions.remove(pos))
        };
        match removed {
            Some(entry) => {
                entry.session.close().await;
                true
            }
            None => false,
        }
    }

    /// Cache a freshly connected session and return the session to use.
    ///
    /// If another caller cached a session for the same key meanwhile, that
    /// one wins and ours is closed.
    async fn insert(
        &self,
        key: &SessionKey,
        session: Arc<dyn RemoteSession>,
    ) -> Arc<dyn RemoteSession> {
        let mut to_close = Vec::new();
        let chosen = {
            let mut sessions = self.sessions.lock();
            if let Some(pos) = sessions.iter().position(|entry| &entry.key == key) {
                let existing = Arc::clone(&sessions[pos].session);
                to_close.push(session);
                existing
            } else {
                sessions.push_back(PooledSession {
                    key: key.clone(),
                    session: Arc::clone(&session),
                });
                while sessions.len() > self.config.capacity {
                    if let Some(evicted) = sessions.pop_front() {
                        debug!(host = %evicted.key.host, user = %evicted.key.user, "evicting least recently used remote session");
                        to_close.push(evicted.session);
                    }
                }
                session
            }
        };

        for stale in to_close {
            stale.close().await;
        }
        chosen
    }
}
