//! Per-user conversation sessions.
//!
//! A session holds one user's credentials and workflow phase. Sessions live
//! in memory only, behind a `tokio::sync::Mutex` each, so a user's turn owns
//! its session for the whole exchange while other users proceed in parallel.

pub mod credentials;
pub mod phase;

pub use credentials::SenderCredentials;
pub use phase::{Phase, PhaseKind};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;

use crate::draft::Draft;

/// One user's conversation state.
#[derive(Debug)]
pub struct Session {
    key: String,
    credentials: Option<SenderCredentials>,
    phase: Phase,
    last_active: Instant,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            credentials: None,
            phase: Phase::Idle,
            last_active: Instant::now(),
        }
    }

    /// Store key, `"<channel>:<user id>"`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn credentials(&self) -> Option<&SenderCredentials> {
        self.credentials.as_ref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Latest generated draft, present only while revising or confirming.
    pub fn draft(&self) -> Option<&Draft> {
        self.phase.draft()
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Start setup over: forget credentials and any draft.
    pub fn begin_setup(&mut self) {
        self.credentials = None;
        self.phase = Phase::AwaitingSetupAddress;
    }

    /// Finish setup with the captured credentials.
    pub fn complete_setup(&mut self, credentials: SenderCredentials) {
        self.credentials = Some(credentials);
        self.phase = Phase::Idle;
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Drop the workflow but keep credentials.
    pub fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Take the phase out, leaving `Idle` behind.
    pub fn take_phase(&mut self) -> Phase {
        std::mem::take(&mut self.phase)
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// In-memory registry of sessions, created lazily on first contact.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for `key`, creating an idle one if needed.
    pub async fn get_or_create(&self, key: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(key) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!(session = key, "Creating session");
            Arc::new(Mutex::new(Session::new(key)))
        });
        Arc::clone(session)
    }

    /// Lock the session for `key` for one turn and mark it active.
    ///
    /// A session pruned between lookup and lock is detached from the store,
    /// so the lookup is retried until the locked session is the registered one.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<Session> {
        loop {
            let session = self.get_or_create(key).await;
            let mut guard = Arc::clone(&session).lock_owned().await;
            let registered = self
                .sessions
                .read()
                .await
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &session));
            if registered {
                guard.touch();
                return guard;
            }
            tracing::debug!(session = key, "Session pruned before lock, retrying");
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for at least `idle_timeout`. Sessions with a turn
    /// in flight are kept. Returns how many were removed.
    pub async fn prune_stale(&self, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.last_active.elapsed() < idle_timeout,
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "Pruned idle sessions");
        }
        removed
    }
}
