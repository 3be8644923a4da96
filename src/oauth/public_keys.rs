//! Retrieval and caching of the provider's published signing keys.

use jsonwebtoken::jwk::JwkSet;
use openidconnect::JsonWebKeySetUrl;
use reqwest::header::ACCEPT;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("key set endpoint unreachable: {0}")]
    TransportFailure(#[source] reqwest::Error),
    #[error("key set endpoint returned status {0}")]
    UnexpectedStatus(u16),
    #[error("malformed key set: {0}")]
    Malformed(String),
}

pub struct PublicKeyFetcher {
    http: reqwest::Client,
    keys_url: JsonWebKeySetUrl,
}

impl PublicKeyFetcher {
    pub fn new(http: reqwest::Client, keys_url: JsonWebKeySetUrl) -> Self {
        PublicKeyFetcher { http, keys_url }
    }

    /// Single unauthenticated GET of the key set.
    pub async fn fetch(&self) -> Result<JwkSet, FetchError> {
        let response = self
            .http
            .get(self.keys_url.url().clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::TransportFailure)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(FetchError::TransportFailure)?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

pub struct PublicKeyCache {
    fetcher: PublicKeyFetcher,
    ttl: Duration,
    cached: Mutex<Option<CachedKeys>>,
}

impl PublicKeyCache {
    pub fn new(fetcher: PublicKeyFetcher, ttl: Duration) -> Self {
        PublicKeyCache {
            fetcher,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached key set, fetching it when absent or older than the TTL.
    pub async fn current(&self) -> Result<Arc<JwkSet>, FetchError> {
        let mut guard = self.cached.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.keys.clone());
            }
        }
        Self::fill(&self.fetcher, &mut guard).await
    }

    /// Re-fetch for a token naming a key missing from `stale`. When another
    /// caller already replaced `stale` while we waited, its set is returned
    /// without a second fetch.
    pub async fn refresh_unless_newer(
        &self,
        stale: &Arc<JwkSet>,
    ) -> Result<Arc<JwkSet>, FetchError> {
        let mut guard = self.cached.lock().await;
        if let Some(cached) = guard.as_ref() {
            if !Arc::ptr_eq(&cached.keys, stale) {
                return Ok(cached.keys.clone());
            }
        }
        Self::fill(&self.fetcher, &mut guard).await
    }

    async fn fill(
        fetcher: &PublicKeyFetcher,
        slot: &mut Option<CachedKeys>,
    ) -> Result<Arc<JwkSet>, FetchError> {
        let keys = Arc::new(fetcher.fetch().await?);
        tracing::debug!(key_count = keys.keys.len(), "fetched provider public keys");
        *slot = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
