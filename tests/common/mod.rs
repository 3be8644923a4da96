#![allow(dead_code)]

use apple_auth_server::{create_app, Config};
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tower_http::trace::TraceLayer;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEAM_ID: &str = "AB12CD34EF";
pub const CLIENT_ID: &str = "com.testmycompany.myapp.service";
pub const KEY_ID: &str = "XY98ZW76VU";
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";
pub const PROVIDER_KEY_ID: &str = "test-key-1";
/// Published EC key; its private half is [`EC_PRIVATE_KEY`].
pub const PROVIDER_EC_KEY_ID: &str = "test-key-ec";
pub const FRONTEND_URL: &str = "http://frontend.test";

pub const EC_PRIVATE_KEY: &str = include_str!("../fixtures/ec_private.pem");
pub const EC_PUBLIC_KEY: &str = include_str!("../fixtures/ec_public.pem");
pub const EC_PRIVATE_KEY_SEC1: &str = include_str!("../fixtures/ec_private_sec1.pem");
pub const EC_PRIVATE_KEY_ENCRYPTED: &str = include_str!("../fixtures/ec_private_encrypted.pem");
pub const PROVIDER_RSA_KEY: &str = include_str!("../fixtures/rsa_private.pem");
pub const OTHER_RSA_KEY: &str = include_str!("../fixtures/rsa_other_private.pem");
pub const PROVIDER_KEYS: &str = include_str!("../fixtures/apple_keys.json");

pub const TOKEN_PATH: &str = "/auth/token";
pub const KEYS_PATH: &str = "/auth/keys";

static LOG_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init_logging() {
    LOG_INITIALIZED.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter("apple_auth_server=debug,tower_http=debug")
            .with_test_writer()
            .init()
    });
}

pub fn provider_keys() -> JwkSet {
    serde_json::from_str(PROVIDER_KEYS).unwrap()
}

/// Claims of a valid id token for [`CLIENT_ID`], expiring in an hour.
pub fn valid_id_token_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": APPLE_ISSUER,
        "aud": CLIENT_ID,
        "sub": "001234.abcdef0123456789.0042",
        "email": "relay@privaterelay.appleid.com",
        "email_verified": "true",
        "is_private_email": true,
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn sign_id_token(claims: &Value, key_id: Option<&str>, private_key_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key_id.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn provider_signed_id_token(claims: &Value) -> String {
    sign_id_token(claims, Some(PROVIDER_KEY_ID), PROVIDER_RSA_KEY)
}

pub fn token_response(id_token: &str) -> Value {
    json!({
        "access_token": "a1b2c3.access",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "r1b2c3.refresh",
        "id_token": id_token,
    })
}

pub fn config_lookup(provider: &Url, overrides: &[(&str, &str)]) -> HashMap<String, String> {
    let base = provider.as_str().trim_end_matches('/');
    let mut vars: HashMap<String, String> = [
        ("APPLE_TEAM_ID", TEAM_ID.to_string()),
        ("APPLE_CLIENT_ID", CLIENT_ID.to_string()),
        ("APPLE_KEY_ID", KEY_ID.to_string()),
        ("APPLE_PRIVATE_KEY", EC_PRIVATE_KEY.to_string()),
        ("APPLE_AUTH_URL", format!("{base}/auth/authorize")),
        ("APPLE_TOKEN_URL", format!("{base}{TOKEN_PATH}")),
        ("APPLE_PUBLIC_KEY_URL", format!("{base}{KEYS_PATH}")),
        ("BACKEND_URL", "http://backend.test".to_string()),
        ("FRONTEND_URL", FRONTEND_URL.to_string()),
        ("TOKEN_EXCHANGE_MAX_RETRIES", "0".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

pub fn test_config(provider: &Url, overrides: &[(&str, &str)]) -> Config {
    let vars = config_lookup(provider, overrides);
    Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub struct TestServer {
    pub base_url: Url,
    pub provider: MockServer,
    pub http: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap()
    }

    /// Runs the login step and returns the issued `state`.
    pub async fn begin_login(&self) -> String {
        let body: Value = self
            .http
            .get(self.url("/auth/apple/login"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let auth_url = Url::parse(body["auth_url"].as_str().unwrap()).unwrap();
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned());
        state.expect("state on authorization url")
    }

    pub async fn post_callback(&self, form: &[(&str, &str)]) -> reqwest::Response {
        self.http
            .post(self.url("/auth/apple/callback"))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_user(&self, session_id: &str) -> reqwest::Response {
        self.http
            .get(self.url("/auth/user"))
            .query(&[("session_id", session_id)])
            .send()
            .await
            .unwrap()
    }
}

pub async fn start_test_server(overrides: &[(&str, &str)]) -> TestServer {
    init_logging();
    let provider = MockServer::start().await;
    let provider_url = Url::parse(&provider.uri()).unwrap();
    let config = test_config(&provider_url, overrides);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = create_app(config).unwrap().layer(TraceLayer::new_for_http());
    tokio::spawn(async { axum::serve(listener, app).await.unwrap() });

    let mut base_url = Url::parse("http://127.0.0.1").unwrap();
    base_url.set_port(Some(port)).unwrap();

    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestServer {
        base_url,
        provider,
        http,
    }
}

pub async fn mount_provider_keys(provider: &MockServer) {
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROVIDER_KEYS))
        .mount(provider)
        .await;
}

/// `Location` header of a redirect, parsed.
pub fn location(response: &reqwest::Response) -> Url {
    let location = response
        .headers()
        .get("location")
        .and_then(|h| h.to_str().ok())
        .expect("redirect location");
    Url::parse(location).unwrap()
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
