use crate::app_state::AppState;
use crate::routes::auth::auth_routes;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

mod auth;

pub fn main_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .nest("/auth", auth_routes())
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Sign in with Apple backend",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "login": "/auth/apple/login",
            "callback": "/auth/apple/callback",
            "user": "/auth/user",
            "logout": "/auth/logout",
        }
    }))
}
