use crate::app_state::AppState;
use crate::routes::auth::callback::{get_callback, post_callback};
use crate::routes::auth::diagnostics::test_config;
use crate::routes::auth::login::login;
use crate::routes::auth::session::{current_user, logout};
use axum::routing::{get, post};
use axum::Router;

mod callback;
mod diagnostics;
mod login;
mod session;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/apple/login", get(login))
        .route("/apple/callback", get(get_callback).post(post_callback))
        .route("/user", get(current_user))
        .route("/logout", post(logout))
        .route("/test-config", get(test_config))
}
