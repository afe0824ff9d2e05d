use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid credentials file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("unsupported credentials type '{found}', expected {expected}")]
    UnsupportedType {
        found: String,
        expected: &'static str,
    },
    #[error("invalid service account private key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),
    #[error("failed to sign token assertion: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("token refresh request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token refresh failed ({status}): {body}")]
    Rejected { status: u16, body: String },
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Read a Google credentials JSON file whose `type`, when present, must be `expected`.
fn load_credentials_file<T: DeserializeOwned>(
    path: &Path,
    expected: &'static str,
) -> Result<T, TokenError> {
    let raw = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parse_error = |source| TokenError::Parse {
        path: path.display().to_string(),
        source,
    };
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(parse_error)?;
    match value.get("type").and_then(|kind| kind.as_str()) {
        None => {}
        Some(kind) if kind == expected => {}
        Some(other) => {
            return Err(TokenError::UnsupportedType {
                found: other.to_string(),
                expected,
            })
        }
    }
    serde_json::from_value(value).map_err(parse_error)
}

/// Google `authorized_user` credentials, as written by `gcloud auth application-default login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUserCredentials {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl AuthorizedUserCredentials {
    pub fn load(path: &Path) -> Result<Self, TokenError> {
        load_credentials_file(path, "authorized_user")
    }
}

/// A Google service account key file, as downloaded from the Cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self, TokenError> {
        load_credentials_file(path, "service_account")
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

enum Grant {
    RefreshToken(AuthorizedUserCredentials),
    JwtBearer {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
}

impl Grant {
    fn token_uri(&self) -> &str {
        match self {
            Self::RefreshToken(credentials) => &credentials.token_uri,
            Self::JwtBearer { key, .. } => &key.token_uri,
        }
    }

    fn form(&self) -> Result<Vec<(&'static str, String)>, TokenError> {
        match self {
            Self::RefreshToken(credentials) => Ok(vec![
                ("grant_type", "refresh_token".to_string()),
                ("client_id", credentials.client_id.clone()),
                ("client_secret", credentials.client_secret.clone()),
                ("refresh_token", credentials.refresh_token.clone()),
            ]),
            Self::JwtBearer { key, signing_key } => Ok(vec![
                ("grant_type", JWT_BEARER_GRANT.to_string()),
                ("assertion", sign_assertion(key, signing_key, Utc::now())?),
            ]),
        }
    }
}

/// RS256 assertion for the JWT-bearer grant, valid for one hour from `now`.
fn sign_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    jsonwebtoken::encode(&header, &claims, signing_key).map_err(TokenError::Sign)
}

#[derive(Debug, Clone, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

enum Inner {
    Fixed(String),
    Refreshing {
        http: reqwest::Client,
        grant: Grant,
        cached: TokioMutex<Option<CachedToken>>,
    },
}

/// Supplies bearer tokens for the Sheets API.
pub struct TokenSource {
    inner: Inner,
}

impl TokenSource {
    pub fn fixed(access_token: impl Into<String>) -> Self {
        Self {
            inner: Inner::Fixed(access_token.into()),
        }
    }

    pub fn authorized_user(http: reqwest::Client, credentials: AuthorizedUserCredentials) -> Self {
        Self::refreshing(http, Grant::RefreshToken(credentials))
    }

    /// Fails early when the key's PEM is not an RSA private key.
    pub fn service_account(http: reqwest::Client, key: ServiceAccountKey) -> Result<Self, TokenError> {
        let signing_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(TokenError::InvalidKey)?;
        Ok(Self::refreshing(http, Grant::JwtBearer { key, signing_key }))
    }

    fn refreshing(http: reqwest::Client, grant: Grant) -> Self {
        Self {
            inner: Inner::Refreshing {
                http,
                grant,
                cached: TokioMutex::new(None),
            },
        }
    }

    pub async fn access_token(&self) -> Result<String, TokenError> {
        match &self.inner {
            Inner::Fixed(token) => Ok(token.clone()),
            Inner::Refreshing {
                http,
                grant,
                cached,
            } => {
                // Held across the refresh so concurrent callers share one request.
                let mut guard = cached.lock().await;
                if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                    return Ok(token.access_token.clone());
                }

                let fresh = request_access_token(http, grant).await?;
                let access_token = fresh.access_token.clone();
                *guard = Some(fresh);
                Ok(access_token)
            }
        }
    }
}

async fn request_access_token(
    http: &reqwest::Client,
    grant: &Grant,
) -> Result<CachedToken, TokenError> {
    let payload = grant.form()?;

    let response = http
        .post(grant.token_uri())
        .header("content-type", "application/x-www-form-urlencoded")
        .form(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read error body>".to_string());
        return Err(TokenError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let refreshed = response.json::<RefreshResponse>().await?;
    let expires_in = refreshed.expires_in.unwrap_or(3600);
    tracing::debug!(expires_in, "refreshed sheets access token");

    Ok(CachedToken {
        access_token: refreshed.access_token,
        expires_at: Utc::now() + Duration::seconds(expires_in),
    })
}
