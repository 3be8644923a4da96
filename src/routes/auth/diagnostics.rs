use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

/// Enough to check a deployment is wired to the right provider account.
/// Never includes key material.
#[derive(Serialize)]
pub struct ConfigSummary {
    pub team_id: String,
    pub client_id: String,
    pub key_id: String,
    pub redirect_uri: String,
    pub private_key_loaded: bool,
    pub id_token_verification: &'static str,
}

pub async fn test_config(State(app_state): State<AppState>) -> Json<ConfigSummary> {
    let apple = app_state.services.apple.config();
    Json(ConfigSummary {
        team_id: apple.team_id.clone(),
        client_id: apple.client_id.as_str().to_string(),
        key_id: apple.key_id.clone(),
        redirect_uri: apple.redirect_uri.as_str().to_string(),
        private_key_loaded: !apple.private_key.is_empty(),
        id_token_verification: apple.id_token_verification.as_str(),
    })
}
