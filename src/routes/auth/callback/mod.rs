mod errors;
mod models;

use crate::oauth::user_profile::AppleUserProfile;
use crate::routes::auth::callback::errors::CallbackError;
use crate::routes::auth::callback::models::CallbackParameters;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Form;

const AUTHENTICATION_FAILED: &str = "authentication_failed";

pub async fn get_callback(
    State(app_state): State<AppState>,
    Query(params): Query<CallbackParameters>,
) -> Result<Redirect, CallbackError> {
    handle_callback(app_state, params).await
}

pub async fn post_callback(
    State(app_state): State<AppState>,
    Form(params): Form<CallbackParameters>,
) -> Result<Redirect, CallbackError> {
    handle_callback(app_state, params).await
}

async fn handle_callback(
    app_state: AppState,
    params: CallbackParameters,
) -> Result<Redirect, CallbackError> {
    let CallbackParameters {
        code,
        state,
        error,
        user,
    } = params;

    if let Some(error) = error {
        if let Some(state) = &state {
            app_state
                .repositories
                .flow_states
                .consume_if_valid(state)
                .await;
        }
        tracing::info!(%error, "provider reported an authorization error");
        return Ok(redirect_to_frontend(&app_state, "error", &error));
    }

    // State is checked before anything touches the network.
    let state = state.ok_or(CallbackError::InvalidState)?;
    app_state
        .repositories
        .flow_states
        .consume(&state)
        .await
        .inspect_err(|err| tracing::warn!(error = %err, "rejected callback"))?;
    let code = code.ok_or(CallbackError::MissingCode)?;

    let (claims, tokens) = match app_state.services.apple.authenticate(&code).await {
        Ok(authenticated) => authenticated,
        Err(err) => {
            tracing::warn!(error = %err, "sign in failed");
            return Ok(redirect_to_frontend(
                &app_state,
                "error",
                AUTHENTICATION_FAILED,
            ));
        }
    };

    let profile = user
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(parse_first_login_profile);
    let subject = claims.subject.clone();
    let session_id = app_state
        .repositories
        .sessions
        .create(claims, tokens, profile)
        .await;
    tracing::info!(%subject, "created session");

    Ok(redirect_to_frontend(
        &app_state,
        "session_id",
        session_id.as_str(),
    ))
}

fn parse_first_login_profile(raw: &str) -> Option<AppleUserProfile> {
    AppleUserProfile::from_json(raw)
        .map_err(|err| tracing::warn!(error = %err, "ignoring malformed user payload"))
        .ok()
}

fn redirect_to_frontend(app_state: &AppState, key: &str, value: &str) -> Redirect {
    let url = app_state.config.frontend_callback_url(&[(key, value)]);
    Redirect::to(url.as_str())
}
