use crate::oauth::client_assertion::{ClientAssertionSigner, SigningError};
use crate::oauth::id_token::{
    insecure_decode_unverified, DecodeError, IdTokenVerifier, IdentityClaims,
};
use crate::oauth::primitives::StateToken;
use crate::oauth::public_keys::{FetchError, PublicKeyCache, PublicKeyFetcher};
use crate::oauth::token_exchange::{ExchangeError, TokenBundle, TokenExchanger};
use chrono::Utc;
use openidconnect::{
    AuthUrl, AuthorizationCode, ClientId, IssuerUrl, JsonWebKeySetUrl, RedirectUrl, TokenUrl,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const AUTHORIZATION_SCOPE: &str = "name email";

/// How the `id_token` in a token response is turned into claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdTokenVerification {
    /// Signature, issuer, audience and expiry are all checked.
    #[default]
    Verified,
    /// Claims are parsed without any check. Development only.
    InsecureSkipSignature,
}

impl IdTokenVerification {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdTokenVerification::Verified => "verified",
            IdTokenVerification::InsecureSkipSignature => "insecure_skip_signature",
        }
    }
}

/// PEM text of the `.p8` signing key. Debug output is redacted.
#[derive(Clone)]
pub struct PrivateKeyPem(String);

impl PrivateKeyPem {
    pub fn new(pem: impl Into<String>) -> Self {
        PrivateKeyPem(pem.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for PrivateKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyPem([redacted])")
    }
}

#[derive(Debug, Clone)]
pub struct AppleProviderConfig {
    pub team_id: String,
    pub client_id: ClientId,
    pub key_id: String,
    pub private_key: PrivateKeyPem,
    pub redirect_uri: RedirectUrl,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub public_key_url: JsonWebKeySetUrl,
    pub issuer: IssuerUrl,
    pub client_assertion_lifetime: chrono::Duration,
    pub http_timeout: Duration,
    pub token_exchange_max_retries: u32,
    pub public_keys_cache_ttl: Duration,
    pub id_token_verification: IdTokenVerification,
}

#[derive(Debug, Error)]
pub enum ServiceInitError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Anything that can go wrong between receiving a code and holding verified
/// claims. Only ever logged; callers show a generic failure to the user.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("provider keys unavailable: {0}")]
    KeyFetch(#[from] FetchError),
    #[error("id token rejected: {0}")]
    Decode(#[from] DecodeError),
}

pub struct AppleIdentityProviderService {
    config: AppleProviderConfig,
    exchanger: TokenExchanger,
    public_keys: PublicKeyCache,
    verifier: IdTokenVerifier,
}

impl AppleIdentityProviderService {
    pub fn new(config: AppleProviderConfig) -> Result<Self, ServiceInitError> {
        let signer = ClientAssertionSigner::from_pem(
            config.team_id.clone(),
            config.client_id.clone(),
            config.key_id.clone(),
            config.private_key.secret(),
        )?
        .with_lifetime(config.client_assertion_lifetime)?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let exchanger = TokenExchanger::new(
            http.clone(),
            config.token_url.clone(),
            config.client_id.clone(),
            config.redirect_uri.clone(),
            Arc::new(signer),
        )
        .with_max_retries(config.token_exchange_max_retries);
        let public_keys = PublicKeyCache::new(
            PublicKeyFetcher::new(http, config.public_key_url.clone()),
            config.public_keys_cache_ttl,
        );
        let verifier = IdTokenVerifier::new(config.issuer.clone(), config.client_id.clone());

        if config.id_token_verification == IdTokenVerification::InsecureSkipSignature {
            tracing::warn!("id token signatures are NOT verified; do not run this in production");
        }

        Ok(Self {
            config,
            exchanger,
            public_keys,
            verifier,
        })
    }

    pub fn config(&self) -> &AppleProviderConfig {
        &self.config
    }

    /// Provider URL the browser is sent to in order to start a login.
    pub fn authorization_url(&self, state: &StateToken) -> Url {
        let mut url = self.config.auth_url.url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id.as_str())
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("response_mode", "form_post")
            .append_pair("state", state.as_str())
            .append_pair("scope", AUTHORIZATION_SCOPE);
        url
    }

    pub async fn exchange_code(
        &self,
        code: &AuthorizationCode,
    ) -> Result<TokenBundle, ExchangeError> {
        self.exchanger.exchange(code).await
    }

    pub async fn decode_id_token(
        &self,
        id_token: &str,
    ) -> Result<IdentityClaims, AuthenticationError> {
        match self.config.id_token_verification {
            IdTokenVerification::Verified => self.verify_id_token(id_token).await,
            IdTokenVerification::InsecureSkipSignature => {
                Ok(insecure_decode_unverified(id_token)?)
            }
        }
    }

    async fn verify_id_token(
        &self,
        id_token: &str,
    ) -> Result<IdentityClaims, AuthenticationError> {
        let keys = self.public_keys.current().await?;
        match self.verifier.verify(id_token, &keys, Utc::now()) {
            Err(DecodeError::UnknownKey) => {
                // The provider may have rotated its keys since the last fetch.
                tracing::debug!("id token key not in cached key set, re-fetching");
                let keys = self.public_keys.refresh_unless_newer(&keys).await?;
                Ok(self.verifier.verify(id_token, &keys, Utc::now())?)
            }
            result => Ok(result?),
        }
    }

    /// Code exchange followed by id token decoding.
    pub async fn authenticate(
        &self,
        code: &AuthorizationCode,
    ) -> Result<(IdentityClaims, TokenBundle), AuthenticationError> {
        let tokens = self.exchange_code(code).await?;
        let claims = self.decode_id_token(&tokens.id_token).await?;
        Ok((claims, tokens))
    }
}
