//! In-memory session store — one conversation record per sender identity.
//!
//! Records live for the process lifetime unless idle eviction is enabled.
//! Callers guarantee a single writer per identity (see `bot::Dispatcher`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::dialogue::Session;

/// A stored session plus bookkeeping.
#[derive(Debug, Clone)]
struct SessionEntry {
    session: Session,
    last_activity: DateTime<Utc>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            last_activity: Utc::now(),
        }
    }
}

/// Keyed by sender identity.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get the session for `id`, if one exists.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).map(|e| e.session.clone())
    }

    /// Start `id` over at the menu, replacing any existing record.
    pub async fn create_or_reset(&self, id: &str) -> Session {
        let session = Session::new();
        self.sessions
            .write()
            .await
            .insert(id.to_string(), SessionEntry::new(session.clone()));
        session
    }

    /// Get the session for `id`, creating a fresh one on first contact.
    pub async fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id = %id, "New session");
                SessionEntry::new(Session::new())
            })
            .session
            .clone()
    }

    /// Replace the stored record for `id` and mark it active.
    pub async fn put(&self, id: &str, session: Session) {
        self.sessions
            .write()
            .await
            .insert(id.to_string(), SessionEntry::new(session));
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`. Returns how many were removed.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_activity >= cutoff);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "Pruned idle sessions");
        }
        pruned
    }
}

/// Spawn a sweep that evicts idle sessions every 60 seconds.
pub fn spawn_pruning_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // Skip immediate first tick
        loop {
            interval.tick().await;
            store.prune_idle(max_idle).await;
        }
    })
}
