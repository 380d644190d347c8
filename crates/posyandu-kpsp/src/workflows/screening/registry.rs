use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::backend::ScopedBackend;
use super::session::ScreeningSession;
use crate::auth::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SharedSession<B> = Arc<Mutex<ScreeningSession<B>>>;

/// Bounds on how many sessions are kept and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions untouched for this long are dropped.
    pub idle_timeout: Duration,
    /// Opening a session beyond this drops the least recently used one.
    pub capacity: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            capacity: 1_000,
        }
    }
}

struct SessionSlot<B> {
    session: SharedSession<B>,
    touched_at: Instant,
    tick: u64,
}

/// Live wizard sessions, kept in memory only.
///
/// Each session sits behind its own async mutex, held across backend calls so
/// requests against one session run one at a time. Idle sessions expire and
/// the map never holds more than `SessionLimits::capacity` entries.
pub struct SessionRegistry<B> {
    backend: Arc<B>,
    sessions: RwLock<HashMap<SessionId, SessionSlot<B>>>,
    sequence: AtomicU64,
    clock: AtomicU64,
    limits: SessionLimits,
}

impl<B> SessionRegistry<B>
where
    B: ScopedBackend + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_limits(backend, SessionLimits::default())
    }

    pub fn with_limits(backend: Arc<B>, limits: SessionLimits) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            clock: AtomicU64::new(0),
            limits,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    fn next_session_id(&self) -> SessionId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        SessionId(format!("kpsp-{id:06}"))
    }

    fn next_tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn expired(&self, slot: &SessionSlot<B>, now: Instant) -> bool {
        now.duration_since(slot.touched_at) >= self.limits.idle_timeout
    }

    /// Registers a fresh session acting with `credential`; the roster is not loaded yet.
    pub async fn create(&self, credential: SessionContext) -> (SessionId, SharedSession<B>) {
        let id = self.next_session_id();
        let backend = Arc::new(self.backend.scoped(credential));
        let session = Arc::new(Mutex::new(ScreeningSession::new(backend)));

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| !self.expired(slot, now));

        let capacity = self.limits.capacity.max(1);
        while sessions.len() >= capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.tick)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
        }

        let dropped = before - sessions.len();
        if dropped > 0 {
            info!(dropped, "screening sessions evicted");
        }

        sessions.insert(
            id.clone(),
            SessionSlot {
                session: Arc::clone(&session),
                touched_at: now,
                tick: self.next_tick(),
            },
        );
        (id, session)
    }

    /// Looks a session up and marks it as used. Expired sessions are dropped here.
    pub async fn get(&self, id: &SessionId) -> Option<SharedSession<B>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if self.expired(sessions.get(id)?, now) {
            sessions.remove(id);
            info!(session_id = %id, "screening session expired");
            return None;
        }

        let tick = self.next_tick();
        let slot = sessions.get_mut(id)?;
        slot.touched_at = now;
        slot.tick = tick;
        Some(Arc::clone(&slot.session))
    }

    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Drops every idle session and reports how many went.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| !self.expired(slot, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
