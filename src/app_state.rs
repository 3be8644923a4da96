pub use crate::config::Config;
use crate::repositories::Repositories;
pub use crate::services::apple_identity_provider::AppleProviderConfig;
use crate::services::apple_identity_provider::{AppleIdentityProviderService, ServiceInitError};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Arc<Services>,
    pub repositories: Arc<Repositories>,
}

pub struct Services {
    pub apple: AppleIdentityProviderService,
}

impl AppState {
    /// In-memory stores with the configured lifetimes.
    pub fn new(config: Config) -> Result<Self, ServiceInitError> {
        let repositories = Repositories::in_memory(config.flow_state_ttl, config.session_ttl);
        Self::with_repositories(config, repositories)
    }

    pub fn with_repositories(
        config: Config,
        repositories: Repositories,
    ) -> Result<Self, ServiceInitError> {
        let services = Services {
            apple: AppleIdentityProviderService::new(config.apple.clone())?,
        };
        Ok(AppState {
            config: Arc::new(config),
            services: Arc::new(services),
            repositories: Arc::new(repositories),
        })
    }
}
