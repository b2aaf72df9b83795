//! Cross-task session registry and idle housekeeping.
//!
//! Each control-channel task owns its [`Session`] directly and runs its own
//! housekeeping timer (`tokio::time::interval`) rather than reporting to a
//! literal per-thread stub the way a one-reactor-per-worker design would;
//! the task itself plays the role of "worker stub" here. What this module
//! adds on top is the cross-task lookup table, since nothing else gives two
//! unrelated connection tasks a way to find each other's session by id.

use crate::auth::UserDetail;
use crate::server::session::Session;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A session reference shared between its owning task and the registry.
pub type SharedSession<U> = Arc<Mutex<Session<U>>>;

/// Global, lock-free-per-bucket registry of live sessions, keyed by id.
///
/// Holds only [`Weak`] references: a session's owning task is the sole
/// strong-reference holder, so the registry can never keep a session alive
/// past the point its task has dropped it.
pub struct SessionManager<U: UserDetail> {
    sessions: DashMap<Uuid, Weak<Mutex<Session<U>>>>,
}

impl<U: UserDetail> Default for SessionManager<U> {
    fn default() -> Self {
        SessionManager { sessions: DashMap::new() }
    }
}

impl<U: UserDetail> SessionManager<U> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under its id, returning the id for convenience.
    pub fn register(&self, session: &SharedSession<U>) -> Uuid {
        let id = {
            // `try_lock` is safe here: callers register a session immediately
            // after constructing it, before anything else can hold the lock.
            let guard = session.try_lock().expect("session not yet shared when registered");
            guard.id
        };
        self.sessions.insert(id, Arc::downgrade(session));
        id
    }

    /// Looks a session up by id, if it's still alive.
    pub fn get(&self, id: Uuid) -> Option<SharedSession<U>> {
        self.sessions.get(&id).and_then(|entry| entry.upgrade())
    }

    /// Idempotently removes `id` from the registry. Safe to call more than
    /// once, or for an id that was never registered.
    pub fn close(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Number of entries still tracked (including any whose session has
    /// since been dropped but not yet swept).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry currently tracks no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops registry entries whose session has already been dropped by its
    /// owning task. Each task's own housekeeping timer is what actually
    /// decides to close an *idle* session; this sweep only reclaims entries
    /// that already died for other reasons (panic, io error) without going
    /// through [`SessionManager::close`].
    pub fn sweep_dead(&self) {
        self.sessions.retain(|_, weak| weak.strong_count() > 0);
    }
}
