use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError, RwLock},
    time::{Duration, Instant},
};

use chatbot::{ChatSession, Transcript};
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use uuid::Uuid;

/// Sessions nobody touched for this long are dropped on the next `create`.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// One chat session. It is locked for the whole duration of a turn, so at
/// most one generation runs per session.
pub struct SessionSlot {
    session: Mutex<ChatSession>,
    turn: StdMutex<Option<Transcript>>,
    last_access: StdMutex<Instant>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            session: Mutex::new(ChatSession::new()),
            turn: StdMutex::new(None),
            last_access: StdMutex::new(Instant::now()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ChatSession> {
        self.session.lock().await
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, ChatSession>, TryLockError> {
        self.session.try_lock()
    }

    /// Publishes `session` as generating until the returned guard is dropped.
    pub fn begin_turn(&self, session: &ChatSession) -> Turn<'_> {
        *self.turn.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(session.transcript().clone());
        Turn(self)
    }

    /// Transcript as it was when the running turn started.
    pub fn running_turn(&self) -> Option<Transcript> {
        self.turn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

pub struct Turn<'a>(&'a SessionSlot);

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        *self.0.turn.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub type SharedSession = Arc<SessionSlot>;

/// In-memory sessions, one per browser tab. Nothing is persisted.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::default(),
            idle_timeout,
        }
    }

    pub fn create(&self) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let session = Arc::new(SessionSlot::new());

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut sessions);
        sessions.insert(id, session.clone());

        (id, session)
    }

    /// Looks up a session and marks it as used.
    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        if let Some(session) = &session {
            session.touch();
        }
        session
    }

    pub fn remove(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // sessions held by a request are never evicted
    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SharedSession>) {
        let before = sessions.len();
        sessions.retain(|_, session| {
            Arc::strong_count(session) > 1 || session.idle_for() < self.idle_timeout
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle sessions");
        }
    }
}
