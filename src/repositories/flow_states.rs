use crate::oauth::primitives::StateToken;
use crate::repositories::expiry_from;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowStateError {
    #[error("state is unknown, expired or already used")]
    InvalidOrReused,
}

/// Pending authorization attempts, keyed by their one-time `state` value.
#[async_trait]
pub trait FlowStateStore: Send + Sync {
    /// Records a fresh random state as pending and returns it.
    async fn issue(&self) -> StateToken;

    /// Removes `state` and reports whether it was pending and unexpired.
    /// A given state yields `true` at most once.
    async fn consume_if_valid(&self, state: &StateToken) -> bool;

    async fn consume(&self, state: &StateToken) -> Result<(), FlowStateError> {
        if self.consume_if_valid(state).await {
            Ok(())
        } else {
            Err(FlowStateError::InvalidOrReused)
        }
    }

    /// Drops expired entries, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

pub struct InMemoryFlowStateStore {
    pending: Mutex<HashMap<StateToken, DateTime<Utc>>>,
    ttl: Duration,
}

impl InMemoryFlowStateStore {
    pub fn new(ttl: Duration) -> Self {
        InMemoryFlowStateStore {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FlowStateStore for InMemoryFlowStateStore {
    async fn issue(&self) -> StateToken {
        let state = StateToken::new_random();
        let expires_at = expiry_from(Utc::now(), self.ttl);
        self.pending.lock().await.insert(state.clone(), expires_at);
        state
    }

    async fn consume_if_valid(&self, state: &StateToken) -> bool {
        let removed = self.pending.lock().await.remove(state);
        match removed {
            Some(expires_at) if expires_at > Utc::now() => true,
            Some(_) => {
                tracing::debug!("rejected expired flow state");
                false
            }
            None => false,
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.pending.lock().await;
        let before = guard.len();
        guard.retain(|_, expires_at| *expires_at > now);
        before - guard.len()
    }
}
