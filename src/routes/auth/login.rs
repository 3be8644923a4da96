use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct LoginResponse {
    pub auth_url: String,
    pub message: &'static str,
}

pub async fn login(State(app_state): State<AppState>) -> Json<LoginResponse> {
    let state = app_state.repositories.flow_states.issue().await;
    let auth_url = app_state.services.apple.authorization_url(&state);
    tracing::debug!("issued flow state for new login");
    Json(LoginResponse {
        auth_url: auth_url.into(),
        message: "Open auth_url to sign in",
    })
}
