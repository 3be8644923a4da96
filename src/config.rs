use crate::oauth::client_assertion::{
    DEFAULT_CLIENT_ASSERTION_LIFETIME_SECS, MAX_CLIENT_ASSERTION_LIFETIME_SECS,
};
use crate::oauth::id_token::APPLE_ISSUER;
use crate::services::apple_identity_provider::{
    AppleProviderConfig, IdTokenVerification, PrivateKeyPem,
};
use openidconnect::{AuthUrl, ClientId, IssuerUrl, JsonWebKeySetUrl, RedirectUrl, TokenUrl};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const APPLE_AUTH_URL: &str = "https://appleid.apple.com/auth/authorize";
const APPLE_TOKEN_URL: &str = "https://appleid.apple.com/auth/token";
const APPLE_PUBLIC_KEY_URL: &str = "https://appleid.apple.com/auth/keys";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_BIND_ADDRESS: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
const CALLBACK_PATH: &str = "/auth/apple/callback";

/// Upper bound for flow state and session lifetimes: one year.
const MAX_STORE_TTL_SECS: i64 = 365 * 24 * 60 * 60;
const MAX_HTTP_TIMEOUT_SECS: i64 = 5 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("failed to read private key file {path}: {source}")]
    PrivateKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend_url: Url,
    pub frontend_url: Url,
    pub flow_state_ttl: chrono::Duration,
    pub session_ttl: chrono::Duration,
    pub apple: AppleProviderConfig,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut backend_url =
            var("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        if let Some(domain) = var("RAILWAY_PUBLIC_DOMAIN") {
            backend_url = format!("https://{domain}");
        } else if let Some(external_url) = var("RENDER_EXTERNAL_URL") {
            backend_url = external_url;
        }
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let redirect_uri = var("APPLE_REDIRECT_URI")
            .unwrap_or_else(|| format!("{backend_url}{CALLBACK_PATH}"));

        let private_key = match (var("APPLE_PRIVATE_KEY"), var("APPLE_PRIVATE_KEY_PATH")) {
            // Single-line env values commonly carry escaped newlines.
            (Some(pem), _) => pem.replace("\\n", "\n"),
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::PrivateKeyFile { path, source })?,
            (None, None) => return Err(ConfigError::Missing("APPLE_PRIVATE_KEY")),
        };

        let insecure_skip = parse_or(&var, "APPLE_INSECURE_SKIP_ID_TOKEN_VERIFICATION", false)?;
        let lifetime_secs = parse_secs_within(
            &var,
            "CLIENT_ASSERTION_LIFETIME_SECS",
            DEFAULT_CLIENT_ASSERTION_LIFETIME_SECS,
            MAX_CLIENT_ASSERTION_LIFETIME_SECS,
        )?;
        let flow_state_ttl_secs =
            parse_secs_within(&var, "FLOW_STATE_TTL_SECS", 600, MAX_STORE_TTL_SECS)?;
        let session_ttl_secs =
            parse_secs_within(&var, "SESSION_TTL_SECS", 86_400, MAX_STORE_TTL_SECS)?;
        let http_timeout_secs =
            parse_secs_within(&var, "HTTP_TIMEOUT_SECS", 10, MAX_HTTP_TIMEOUT_SECS)?;

        let apple = AppleProviderConfig {
            team_id: required(&var, "APPLE_TEAM_ID")?,
            client_id: ClientId::new(required(&var, "APPLE_CLIENT_ID")?),
            key_id: required(&var, "APPLE_KEY_ID")?,
            private_key: PrivateKeyPem::new(private_key),
            redirect_uri: RedirectUrl::new(redirect_uri)
                .map_err(|e| invalid("APPLE_REDIRECT_URI", e))?,
            auth_url: AuthUrl::new(var("APPLE_AUTH_URL").unwrap_or(APPLE_AUTH_URL.to_string()))
                .map_err(|e| invalid("APPLE_AUTH_URL", e))?,
            token_url: TokenUrl::new(
                var("APPLE_TOKEN_URL").unwrap_or(APPLE_TOKEN_URL.to_string()),
            )
            .map_err(|e| invalid("APPLE_TOKEN_URL", e))?,
            public_key_url: JsonWebKeySetUrl::new(
                var("APPLE_PUBLIC_KEY_URL").unwrap_or(APPLE_PUBLIC_KEY_URL.to_string()),
            )
            .map_err(|e| invalid("APPLE_PUBLIC_KEY_URL", e))?,
            issuer: IssuerUrl::new(var("APPLE_ISSUER").unwrap_or(APPLE_ISSUER.to_string()))
                .map_err(|e| invalid("APPLE_ISSUER", e))?,
            client_assertion_lifetime: chrono::Duration::seconds(lifetime_secs),
            http_timeout: Duration::from_secs(http_timeout_secs.unsigned_abs()),
            token_exchange_max_retries: parse_or(&var, "TOKEN_EXCHANGE_MAX_RETRIES", 2)?,
            public_keys_cache_ttl: Duration::from_secs(parse_or(
                &var,
                "PUBLIC_KEYS_CACHE_TTL_SECS",
                3600,
            )?),
            id_token_verification: if insecure_skip {
                IdTokenVerification::InsecureSkipSignature
            } else {
                IdTokenVerification::Verified
            },
        };

        Ok(Config {
            bind_address: parse_or(&var, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?,
            backend_url: Url::parse(&backend_url).map_err(|e| invalid("BACKEND_URL", e))?,
            frontend_url: Url::parse(
                &var("FRONTEND_URL").unwrap_or(DEFAULT_FRONTEND_URL.to_string()),
            )
            .map_err(|e| invalid("FRONTEND_URL", e))?,
            flow_state_ttl: chrono::Duration::seconds(flow_state_ttl_secs),
            session_ttl: chrono::Duration::seconds(session_ttl_secs),
            apple,
        })
    }

    /// `{FRONTEND_URL}/callback` with the given query parameters appended.
    pub fn frontend_callback_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.frontend_url.clone();
        let path = format!("{}/callback", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut().extend_pairs(params);
        url
    }
}

fn required<F>(var: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<F, T>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}

/// Whole seconds in `1..=max`.
fn parse_secs_within<F>(
    var: &F,
    name: &'static str,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(var, name, default)?;
    if !(1..=max).contains(&secs) {
        return Err(ConfigError::Invalid {
            var: name,
            reason: format!("must be within 1..={max}"),
        });
    }
    Ok(secs)
}

fn invalid(var: &'static str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: err.to_string(),
    }
}
