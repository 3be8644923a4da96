pub mod app_state;
pub mod config;
pub mod oauth;
pub mod repositories;
pub mod routes;
pub mod services;

pub use crate::app_state::{AppState, AppleProviderConfig, Config, Services};
pub use crate::repositories::Repositories;
pub use crate::services::apple_identity_provider::{IdTokenVerification, ServiceInitError};
use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

const LOCAL_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Builds the router with in-memory stores and starts their expiry sweep.
pub fn create_app(config: Config) -> Result<Router, ServiceInitError> {
    let app_state = AppState::new(config)?;
    app_state.repositories.spawn_auto_cleanup();
    Ok(create_app_with_state(app_state))
}

pub fn create_app_with_state(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);
    routes::main_router().layer(cors).with_state(app_state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let frontend_origin = config.frontend_url.origin().ascii_serialization();
    let origins: Vec<HeaderValue> = [frontend_origin.as_str(), LOCAL_FRONTEND_ORIGIN]
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
