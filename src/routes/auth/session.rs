use crate::oauth::primitives::SessionId;
use crate::repositories::sessions::{SessionError, SessionView};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
pub struct SessionParameters {
    session_id: Option<SessionId>,
}

pub async fn current_user(
    State(app_state): State<AppState>,
    Query(params): Query<SessionParameters>,
) -> Result<Json<SessionView>, SessionLookupError> {
    let session_id = params
        .session_id
        .ok_or(SessionLookupError::Unauthenticated)?;
    let view = app_state.repositories.sessions.get(&session_id).await?;
    Ok(Json(view))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

pub async fn logout(
    State(app_state): State<AppState>,
    Query(params): Query<SessionParameters>,
) -> Json<LogoutResponse> {
    if let Some(session_id) = params.session_id {
        app_state.repositories.sessions.delete(&session_id).await;
    }
    Json(LogoutResponse {
        message: "Logged out",
    })
}

/// Absent, expired and never-issued sessions are deliberately
/// indistinguishable.
pub enum SessionLookupError {
    Unauthenticated,
}

impl From<SessionError> for SessionLookupError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => SessionLookupError::Unauthenticated,
        }
    }
}

impl IntoResponse for SessionLookupError {
    fn into_response(self) -> Response {
        match self {
            SessionLookupError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Invalid or expired session" })),
            )
                .into_response(),
        }
    }
}
