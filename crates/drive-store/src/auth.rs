//! Credential loading and OAuth access-token caching.
//!
//! Three credential files are understood, all distinguished by their `type`
//! field:
//! - `service_account`: a Google Cloud service-account key; a signed JWT
//!   assertion is exchanged for an access token.
//! - `authorized_user`: a refresh token with its OAuth client, as written by
//!   `gcloud auth application-default login`.
//! - `access_token`: a pre-issued bearer token, used as-is.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{RemoteError, Result};

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;
const TOKEN_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    AccessToken { access_token: String },
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credentials {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|err| RemoteError::Credentials {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_slice(&data).map_err(|err| RemoteError::Credentials {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::AuthorizedUser(_) => "authorized_user",
            Credentials::AccessToken { .. } => "access_token",
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("private_key", &"<redacted>")
                .field("token_uri", &key.token_uri)
                .finish(),
            Credentials::AuthorizedUser(user) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &user.client_id)
                .field("client_secret", &"<redacted>")
                .field("refresh_token", &"<redacted>")
                .finish(),
            Credentials::AccessToken { .. } => f
                .debug_struct("AccessToken")
                .field("access_token", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_READONLY_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|err| {
            RemoteError::Authentication(format!("invalid service account private key: {err}"))
        })?;
        jsonwebtoken::encode(&header, &claims, &key).map_err(|err| {
            RemoteError::Authentication(format!("failed to sign token assertion: {err}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// Hands out bearer tokens, refreshing them shortly before expiry.
pub struct TokenProvider {
    credentials: Credentials,
    http: reqwest::Client,
    request_timeout: std::time::Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            request_timeout: TOKEN_REQUEST_TIMEOUT,
            cached: Mutex::new(None),
        }
    }

    /// Upper bound for one round trip to the token endpoint.
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn access_token(&self) -> Result<String> {
        if let Credentials::AccessToken { access_token } = &self.credentials {
            return Ok(access_token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let (token_uri, form) = match &self.credentials {
            Credentials::ServiceAccount(key) => (
                key.token_uri.as_str(),
                vec![
                    ("grant_type", JWT_BEARER_GRANT.to_string()),
                    ("assertion", key.assertion(Utc::now())?),
                ],
            ),
            Credentials::AuthorizedUser(user) => (
                user.token_uri.as_str(),
                vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("client_id", user.client_id.clone()),
                    ("client_secret", user.client_secret.clone()),
                    ("refresh_token", user.refresh_token.clone()),
                ],
            ),
            Credentials::AccessToken { access_token } => {
                return Ok(CachedToken {
                    value: access_token.clone(),
                    expires_at: Utc::now() + Duration::days(365),
                });
            }
        };

        debug!(kind = self.credentials.kind(), token_uri, "requesting access token");
        let response = self
            .http
            .post(token_uri)
            .form(&form)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Authentication(format!(
                "token endpoint returned {status}: {}",
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| RemoteError::Parse(format!("token response: {err}")))?;
        info!(
            kind = self.credentials.kind(),
            expires_in = token.expires_in,
            "obtained access token"
        );
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
