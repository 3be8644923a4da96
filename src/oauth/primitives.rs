use openidconnect::CsrfToken;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

/// 43 alphanumeric characters carry a little over 256 bits of entropy.
const SESSION_ID_LEN: usize = 43;

/// Number of random bytes behind a flow `state` value.
const STATE_TOKEN_BYTES: u32 = 32;

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new_random() -> Self {
        let session_id: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LEN)
            .map(char::from)
            .collect();
        SessionId(session_id)
    }

    pub fn new<S: ToString>(id: S) -> Self {
        SessionId(id.to_string())
    }
}

/// One-time CSRF correlation value sent as `state` on the authorization URL.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateToken(String);

impl StateToken {
    pub fn new_random() -> Self {
        StateToken(CsrfToken::new_random_len(STATE_TOKEN_BYTES).secret().clone())
    }

    pub fn new<S: ToString>(state: S) -> Self {
        StateToken(state.to_string())
    }
}

macro_rules! as_str {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
as_str!(SessionId);
as_str!(StateToken);
