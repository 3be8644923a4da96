use crate::oauth::id_token::IdentityClaims;
use crate::oauth::primitives::SessionId;
use crate::oauth::token_exchange::TokenBundle;
use crate::oauth::user_profile::AppleUserProfile;
use crate::repositories::expiry_from;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Session {
    pub claims: IdentityClaims,
    pub tokens: TokenBundle,
    pub profile: Option<AppleUserProfile>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What the end user may see of a session. The token bundle never leaves
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub is_private_email: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<AppleUserProfile>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        SessionView {
            user_id: session.claims.subject.clone(),
            email: session.claims.email.clone(),
            email_verified: session.claims.email_verified,
            is_private_email: session.claims.is_private_email,
            profile: session.profile.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        claims: IdentityClaims,
        tokens: TokenBundle,
        profile: Option<AppleUserProfile>,
    ) -> SessionId;

    /// Expired sessions are reported as [`SessionError::NotFound`].
    async fn get(&self, session_id: &SessionId) -> Result<SessionView, SessionError>;

    /// Idempotent.
    async fn delete(&self, session_id: &SessionId);

    async fn purge_expired(&self) -> usize;
}

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        InMemorySessionStore {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Full session including the token bundle, for server-side use only.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let guard = self.sessions.lock().await;
        guard
            .get(session_id)
            .filter(|session| session.expires_at > Utc::now())
            .cloned()
            .ok_or(SessionError::NotFound)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        claims: IdentityClaims,
        tokens: TokenBundle,
        profile: Option<AppleUserProfile>,
    ) -> SessionId {
        let session_id = SessionId::new_random();
        let created_at = Utc::now();
        let session = Session {
            claims,
            tokens,
            profile,
            created_at,
            expires_at: expiry_from(created_at, self.ttl),
        };
        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), session);
        session_id
    }

    async fn get(&self, session_id: &SessionId) -> Result<SessionView, SessionError> {
        let mut guard = self.sessions.lock().await;
        match guard.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(SessionView::from(session)),
            Some(_) => {
                guard.remove(session_id);
                Err(SessionError::NotFound)
            }
            None => Err(SessionError::NotFound),
        }
    }

    async fn delete(&self, session_id: &SessionId) {
        self.sessions.lock().await.remove(session_id);
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.sessions.lock().await;
        let before = guard.len();
        guard.retain(|_, session| session.expires_at > now);
        before - guard.len()
    }
}
