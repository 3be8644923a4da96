use crate::oauth::client_assertion::{ClientAssertionSigner, SigningError};
use openidconnect::{AccessToken, AuthorizationCode, ClientId, RedirectUrl, RefreshToken, TokenUrl};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// The provider's token response. Only `id_token` is ever looked into.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: AccessToken,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<RefreshToken>,
    pub id_token: String,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: AccessToken,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TryFrom<TokenEndpointResponse> for TokenBundle {
    type Error = ExchangeError;

    fn try_from(response: TokenEndpointResponse) -> Result<Self, Self::Error> {
        let id_token = response
            .id_token
            .ok_or_else(|| ExchangeError::MalformedResponse("id_token missing".to_string()))?;
        Ok(TokenBundle {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            id_token,
        })
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("token endpoint rejected the code with status {status}: {body}")]
    ProviderRejected { status: u16, body: String },
    #[error("token endpoint unreachable: {0}")]
    TransportFailure(#[source] reqwest::Error),
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: TokenUrl,
    client_id: ClientId,
    redirect_uri: RedirectUrl,
    signer: Arc<ClientAssertionSigner>,
    max_retries: u32,
}

impl TokenExchanger {
    pub fn new(
        http: reqwest::Client,
        token_url: TokenUrl,
        client_id: ClientId,
        redirect_uri: RedirectUrl,
        signer: Arc<ClientAssertionSigner>,
    ) -> Self {
        TokenExchanger {
            http,
            token_url,
            client_id,
            redirect_uri,
            signer,
            max_retries: 0,
        }
    }

    /// Retries apply to failures before a response status arrives; any
    /// response, including one whose body cannot be read, is final.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn exchange(&self, code: &AuthorizationCode) -> Result<TokenBundle, ExchangeError> {
        let mut attempt = 0;
        loop {
            match self.exchange_once(code).await {
                Err(ExchangeError::TransportFailure(err)) if attempt < self.max_retries => {
                    let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "token endpoint transport failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn exchange_once(&self, code: &AuthorizationCode) -> Result<TokenBundle, ExchangeError> {
        // A fresh assertion per request, never reused.
        let assertion = self.signer.sign_now()?;
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", assertion.as_str()),
            ("code", code.secret().as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.url().clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(ExchangeError::TransportFailure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        // The code is spent once a status arrives, so body errors are final.
        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;
        let token_response: TokenEndpointResponse = serde_json::from_slice(&body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;
        TokenBundle::try_from(token_response)
    }
}
