//! Decoding of the provider's `id_token`.
//!
//! [`IdTokenVerifier::verify`] is the normal path: it checks the signature
//! against the published key set, then issuer, audience and expiry.
//! [`insecure_decode_unverified`] only parses the payload and exists for local
//! development against a provider whose keys are not reachable.

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use openidconnect::{ClientId, IssuerUrl};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

const ALLOWED_ALGORITHMS: [Algorithm; 2] = [Algorithm::RS256, Algorithm::ES256];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub email_verified: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub is_private_email: Option<bool>,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "aud", deserialize_with = "deserialize_audience")]
    pub audience: Vec<String>,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "iat", default)]
    pub issued_at: Option<i64>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed id token: {0}")]
    Malformed(String),
    #[error("no published key matches the token key id")]
    UnknownKey,
    #[error("id token signature verification failed")]
    BadSignature,
    #[error("unexpected issuer {0}")]
    BadIssuer(String),
    #[error("audience {0:?} does not contain this client")]
    BadAudience(Vec<String>),
    #[error("id token expired at {expires_at}")]
    Expired { expires_at: i64 },
}

impl DecodeError {
    fn from_verification(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::Crypto(_) => DecodeError::BadSignature,
            _ => DecodeError::Malformed(err.to_string()),
        }
    }
}

/// Parses the claims of `id_token` WITHOUT checking its signature, issuer,
/// audience or expiry. Never use the result as proof of identity outside of
/// development setups.
pub fn insecure_decode_unverified(id_token: &str) -> Result<IdentityClaims, DecodeError> {
    let mut parts = id_token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Err(DecodeError::Malformed("expected three segments".to_string())),
    };
    let payload = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    serde_json::from_slice(&payload).map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct IdTokenVerifier {
    issuer: IssuerUrl,
    client_id: ClientId,
}

impl IdTokenVerifier {
    pub fn new(issuer: IssuerUrl, client_id: ClientId) -> Self {
        IdTokenVerifier { issuer, client_id }
    }

    pub fn verify(
        &self,
        id_token: &str,
        keys: &JwkSet,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaims, DecodeError> {
        let header = decode_header(id_token).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(DecodeError::BadSignature);
        }
        let key_id = header.kid.as_deref().ok_or(DecodeError::UnknownKey)?;
        let jwk = keys.find(key_id).ok_or(DecodeError::UnknownKey)?;
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|_| DecodeError::UnknownKey)?;

        // Signature only; the claim checks below run against the injected clock.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<IdentityClaims>(id_token, &decoding_key, &validation)
            .map_err(DecodeError::from_verification)?
            .claims;
        self.check_claims(&claims, now)?;
        Ok(claims)
    }

    fn check_claims(&self, claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), DecodeError> {
        if claims.issuer != self.issuer.as_str() {
            return Err(DecodeError::BadIssuer(claims.issuer.clone()));
        }
        if !claims.audience.iter().any(|aud| aud == self.client_id.as_str()) {
            return Err(DecodeError::BadAudience(claims.audience.clone()));
        }
        if claims.expires_at <= now.timestamp() {
            return Err(DecodeError::Expired {
                expires_at: claims.expires_at,
            });
        }
        Ok(())
    }
}

// Apple sends these flags either as JSON booleans or as "true"/"false".
fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(value)) => Ok(Some(value)),
        Some(BoolOrString::String(value)) => match value.as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(de::Error::invalid_value(
                Unexpected::Str(other),
                &"a boolean or \"true\"/\"false\"",
            )),
        },
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(audience) => vec![audience],
        OneOrMany::Many(audiences) => audiences,
    })
}
