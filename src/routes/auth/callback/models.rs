use crate::oauth::primitives::StateToken;
use openidconnect::AuthorizationCode;
use serde::Deserialize;

/// Fields the provider sends back, as query parameters or as a form post.
#[derive(Deserialize)]
pub struct CallbackParameters {
    pub code: Option<AuthorizationCode>,
    pub state: Option<StateToken>,
    pub error: Option<String>,
    /// JSON profile, present only on a user's first authorization.
    pub user: Option<String>,
}
