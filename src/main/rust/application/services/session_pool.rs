use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use crate::domain::entities::PeerSession;
use crate::domain::ports::{MetricsReporter, StateListener};
use crate::domain::value_objects::{ConnectionState, PoolConfig};

/// Tracks live peer sessions, oldest first.
///
/// The capacity bound is only enforced when a session reaches `connected`,
/// so sessions still negotiating may briefly push the pool past it.
pub struct SessionPool {
    sessions: Mutex<VecDeque<Arc<PeerSession>>>,
    next_sequence: AtomicU64,
    config: PoolConfig,
    metrics: Arc<dyn MetricsReporter>,
}

impl SessionPool {
    pub fn new(config: PoolConfig, metrics: Arc<dyn MetricsReporter>) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            next_sequence: AtomicU64::new(0),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Insertion order for the next session
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, session: Arc<PeerSession>) {
        let total = {
            let mut sessions = self.lock();
            sessions.push_back(session.clone());
            sessions.len()
        };
        self.metrics.report_session_registered();
        tracing::info!(
            session_id = %session.id(),
            sequence = session.sequence(),
            total,
            "Session registered"
        );
    }

    /// Listener to hand to the session's transport. Holds only weak
    /// references so a transport callback never keeps the pool alive.
    pub fn listener_for(self: &Arc<Self>, session: &Arc<PeerSession>) -> StateListener {
        let pool = Arc::downgrade(self);
        let session = Arc::downgrade(session);
        Arc::new(move |state| {
            let pool = pool.clone();
            let session = session.clone();
            Box::pin(async move {
                if let (Some(pool), Some(session)) = (pool.upgrade(), session.upgrade()) {
                    pool.on_state_change(&session, state).await;
                }
            })
        })
    }

    pub async fn on_state_change(&self, session: &Arc<PeerSession>, state: ConnectionState) {
        let previous = session.record_state(state);
        tracing::info!(
            session_id = %session.id(),
            from = %previous,
            to = %state,
            "Connection state changed"
        );

        match state {
            ConnectionState::Failed => {
                self.metrics.report_session_failed();
                // May already be gone if it was evicted meanwhile
                self.remove(session.id());
                // The transport may still be inside its state callback here,
                // and its close waits on that same callback lock.
                let session = session.clone();
                tokio::spawn(async move {
                    Self::close_session(&session).await;
                });
            }
            ConnectionState::Connected => {
                if let Some(oldest) = self.evict_oldest_over_capacity() {
                    tracing::warn!(
                        session_id = %oldest.id(),
                        sequence = oldest.sequence(),
                        age_ms = oldest.age().as_millis() as u64,
                        max_connections = self.config.max_connections(),
                        "Force-disconnecting oldest session"
                    );
                    tokio::spawn(async move {
                        Self::close_session(&oldest).await;
                    });
                }
            }
            _ => {}
        }
    }

    /// Remove a session; `None` if it was already removed
    pub fn remove(&self, session_id: &str) -> Option<Arc<PeerSession>> {
        let removed = {
            let mut sessions = self.lock();
            let index = sessions.iter().position(|s| s.id() == session_id)?;
            sessions.remove(index)
        };
        if removed.is_some() {
            self.metrics.report_session_removed();
            tracing::debug!(session_id, "Session removed from pool");
        }
        removed
    }

    /// Remove and close a session whose negotiation did not complete
    pub async fn discard(&self, session: &Arc<PeerSession>) {
        self.remove(session.id());
        Self::close_session(session).await;
    }

    /// Close every tracked session concurrently and wait for all of them
    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.lock().drain(..).collect();
        if sessions.is_empty() {
            return;
        }
        tracing::info!(count = sessions.len(), "Closing all sessions");

        let mut closing = JoinSet::new();
        for session in sessions {
            self.metrics.report_session_removed();
            closing.spawn(async move {
                Self::close_session(&session).await;
            });
        }
        while let Some(result) = closing.join_next().await {
            if let Err(e) = result {
                tracing::error!("Session close task failed: {}", e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().iter().any(|s| s.id() == session_id)
    }

    /// Tracked session ids, oldest first
    pub fn session_ids(&self) -> Vec<String> {
        self.lock().iter().map(|s| s.id().to_string()).collect()
    }

    fn evict_oldest_over_capacity(&self) -> Option<Arc<PeerSession>> {
        let evicted = {
            let mut sessions = self.lock();
            if sessions.len() <= self.config.max_connections() {
                return None;
            }
            sessions.pop_front()
        };
        if evicted.is_some() {
            self.metrics.report_session_removed();
            self.metrics.report_session_evicted();
        }
        evicted
    }

    async fn close_session(session: &Arc<PeerSession>) {
        match session.close().await {
            Ok(true) => tracing::debug!(session_id = %session.id(), "Session closed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                session_id = %session.id(),
                "Close failed, treating session as closed: {}",
                e
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<PeerSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
