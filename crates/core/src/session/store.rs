use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::session::{Session, SessionPatch, SessionSnapshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResetScope {
    One(String),
    All,
}

/// Shared, concurrency-safe map of live sessions.
///
/// Every call takes the lock once, so each read or patch is atomic. Two turns
/// racing on the same session are not serialized: the later patch wins field
/// by field.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle_timeout: Duration,
    max_history: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_history: usize) -> Self {
        Self { sessions: Arc::default(), idle_timeout, max_history }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.idle_timeout(), config.max_history)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the session, creating it on first contact. Either way the
    /// session's `last_activity` is refreshed.
    pub fn get_or_create(&self, session_id: &str) -> Session {
        let now = Utc::now();
        let mut sessions = self.write();
        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(event_name = "session.created", session_id, "session created");
            Session::new(session_id, now)
        });
        session.last_activity = now;
        session.clone()
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.read().get(session_id).cloned()
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.read().get(session_id).map(Session::snapshot)
    }

    /// Applies `patch` to a live session. Returns `false` without touching the
    /// store when the session was evicted or reset in the meantime.
    pub fn update(&self, session_id: &str, patch: SessionPatch) -> bool {
        let mut sessions = self.write();
        let Some(session) = sessions.get_mut(session_id) else {
            debug!(
                event_name = "session.update.dropped",
                session_id, "update for a missing session was dropped"
            );
            return false;
        };
        session.apply(patch, self.max_history);
        session.last_activity = Utc::now();
        true
    }

    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snapshots = self.read().values().map(Session::snapshot).collect::<Vec<_>>();
        snapshots.sort_by(|left, right| left.session_id.cmp(&right.session_id));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn reset(&self, scope: ResetScope) -> usize {
        let mut sessions = self.write();
        let removed = match &scope {
            ResetScope::One(session_id) => usize::from(sessions.remove(session_id).is_some()),
            ResetScope::All => {
                let count = sessions.len();
                sessions.clear();
                count
            }
        };
        info!(event_name = "session.reset", scope = ?scope, removed, "sessions reset");
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Evicts every session idle for longer than the configured timeout as of
    /// `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| !is_expired(session, now, self.idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(
                event_name = "session.sweep.evicted",
                evicted,
                remaining = sessions.len(),
                "expired sessions evicted"
            );
        }
        evicted
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn is_expired(session: &Session, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
    match (now - session.last_activity).to_std() {
        Ok(idle) => idle > idle_timeout,
        Err(_) => false,
    }
}
