use crate::repositories::flow_states::{FlowStateStore, InMemoryFlowStateStore};
use crate::repositories::sessions::{InMemorySessionStore, SessionStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Weak};

pub mod flow_states;
pub mod sessions;

const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// `now + ttl`, saturating instead of overflowing.
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct Repositories {
    pub flow_states: Arc<dyn FlowStateStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Repositories {
    pub fn new(flow_states: Arc<dyn FlowStateStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Repositories {
            flow_states,
            sessions,
        }
    }

    pub fn in_memory(flow_state_ttl: Duration, session_ttl: Duration) -> Self {
        Repositories::new(
            Arc::new(InMemoryFlowStateStore::new(flow_state_ttl)),
            Arc::new(InMemorySessionStore::new(session_ttl)),
        )
    }

    /// Periodically drops expired flow states and sessions. The task ends once
    /// the repositories are dropped. Must be called inside a tokio runtime.
    pub fn spawn_auto_cleanup(self: &Arc<Self>) {
        let repositories: Weak<Repositories> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(repositories) = repositories.upgrade() else {
                    break;
                };
                let flow_states = repositories.flow_states.purge_expired().await;
                let sessions = repositories.sessions.purge_expired().await;
                if flow_states > 0 || sessions > 0 {
                    tracing::info!(flow_states, sessions, "cleaned up expired entries");
                }
            }
        });
    }
}
