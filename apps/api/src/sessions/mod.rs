//! Sessions: one per open UI view, each owning an independent chat and
//! recommendation state machine. In memory only; nothing outlives the process.
//!
//! Sessions that see no requests for `idle_ttl` are evicted by a periodic
//! sweep, and the registry refuses new sessions past `max_sessions`.

pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::session::ChatSession;
use crate::errors::AppError;
use crate::recommendation::flow::{RecommendationFlow, RecommendationStatus};
use crate::state::AppState;

pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub chat: Arc<ChatSession>,
    pub recommendations: RecommendationFlow,
    last_active: Mutex<Instant>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new(chat_timeout: Duration) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            created_at: Utc::now(),
            chat: Arc::new(ChatSession::new(id, chat_timeout)),
            recommendations: RecommendationFlow::new(),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let last = *self.last_active.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }

    /// A session with work in flight is never evicted.
    fn is_busy(&self) -> bool {
        self.chat.snapshot().is_pending()
            || self.recommendations.status() == RecommendationStatus::Analyzing
    }
}

/// Bounds on how many sessions the registry holds and for how long.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub chat_timeout: Duration,
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Creates a session. At capacity, idle sessions are evicted first; if
    /// none are idle the request is refused.
    pub async fn create(&self) -> Result<Arc<Session>, AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limits.max_sessions {
            self.evict_locked(&mut sessions, Instant::now());
        }
        if sessions.len() >= self.limits.max_sessions {
            warn!(max_sessions = self.limits.max_sessions, "Session limit reached");
            return Err(AppError::Unavailable(
                "Too many open sessions, try again later".to_string(),
            ));
        }

        let session = Arc::new(Session::new(self.limits.chat_timeout));
        sessions.insert(session.id, Arc::clone(&session));
        info!(session_id = %session.id, active = sessions.len(), "Session created");
        Ok(session)
    }

    /// Looks up a session and records the access as activity.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Removes the session and cancels its in-flight chat request.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(&id)?;
        removed.chat.close();
        info!(session_id = %id, "Session closed");
        Some(removed)
    }

    /// Drops every session idle for at least `idle_ttl`. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_locked(&mut sessions, Instant::now())
    }

    fn evict_locked(&self, sessions: &mut HashMap<Uuid, Arc<Session>>, now: Instant) -> usize {
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.idle_for(now) >= self.limits.idle_ttl && !s.is_busy())
            .map(|s| s.id)
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.chat.close();
            }
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), active = sessions.len(), "Idle sessions evicted");
        }
        expired.len()
    }

    /// Runs `evict_idle` every `every` until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.evict_idle().await;
            }
        })
    }
}

/// Looks up a session or fails with 404.
pub async fn require_session(state: &AppState, id: Uuid) -> Result<Arc<Session>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

#[cfg(test)]
pub(crate) fn test_limits() -> SessionLimits {
    SessionLimits {
        chat_timeout: Duration::from_secs(30),
        idle_ttl: Duration::from_secs(600),
        max_sessions: 100,
    }
}
