//! OAuth access tokens for Firestore.
//!
//! A service-account key signs a short-lived RS256 assertion which the
//! account's token endpoint exchanges for a bearer token. The token is minted
//! on first use and reused until it is within [`REFRESH_MARGIN_SECS`] of
//! expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use settle_core::Clock;
use tokio::sync::Mutex;

use crate::{
    credentials::{Credentials, ServiceAccount},
    error::{body_to_json, Result, StoreError},
};

/// OAuth scope granting Firestore read/write access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Tokens are refreshed this many seconds before they expire.
pub const REFRESH_MARGIN_SECS: i64 = 60;

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const EMULATOR_TOKEN: &str = "owner";

/// Claims of the service-account assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service-account email.
    pub iss: String,
    /// Requested OAuth scope.
    pub scope: String,
    /// Token endpoint.
    pub aud: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Supplies bearer tokens for store requests.
pub struct TokenSource {
    kind: SourceKind,
    clock: Arc<dyn Clock>,
}

enum SourceKind {
    Emulator,
    ServiceAccount {
        account: ServiceAccount,
        key: EncodingKey,
        http: reqwest::Client,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            SourceKind::Emulator => "emulator",
            SourceKind::ServiceAccount { .. } => "service_account",
        };
        f.debug_struct("TokenSource").field("kind", &kind).finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Creates a token source for the given credentials.
    ///
    /// The private key is parsed here so a bad key fails at startup rather
    /// than on the first webhook.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Credentials` if the private key is not a valid
    /// RSA PEM key.
    pub fn new(credentials: &Credentials, http: reqwest::Client, clock: Arc<dyn Clock>) -> Result<Self> {
        let kind = match credentials {
            Credentials::Emulator { .. } => SourceKind::Emulator,
            Credentials::ServiceAccount(account) => {
                let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
                    .map_err(|e| StoreError::credentials(format!("private key: {e}")))?;
                SourceKind::ServiceAccount {
                    account: account.clone(),
                    key,
                    http,
                    cached: Mutex::new(None),
                }
            },
        };

        Ok(Self { kind, clock })
    }

    /// Returns a valid bearer token, minting a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Authentication` if the token endpoint rejects
    /// the assertion or cannot be reached.
    pub async fn bearer(&self) -> Result<String> {
        let SourceKind::ServiceAccount { account, key, http, cached } = &self.kind else {
            return Ok(EMULATOR_TOKEN.to_string());
        };

        let mut cached = cached.lock().await;
        let now = self.clock.now_utc();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!(client_email = %account.client_email, "Minting Firestore access token");
        let token = mint(account, key, http, now).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

fn sign_assertion(account: &ServiceAccount, key: &EncodingKey, now: DateTime<Utc>) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&account.private_key_id);

    let claims = AssertionClaims {
        iss: account.client_email.clone(),
        scope: DATASTORE_SCOPE.to_string(),
        aud: account.token_uri.clone(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    jsonwebtoken::encode(&header, &claims, key)
        .map_err(|e| StoreError::credentials(format!("failed to sign assertion: {e}")))
}

async fn mint(
    account: &ServiceAccount,
    key: &EncodingKey,
    http: &reqwest::Client,
    now: DateTime<Utc>,
) -> Result<CachedToken> {
    let assertion = sign_assertion(account, key, now)?;

    let response = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| StoreError::authentication(format!("token endpoint unreachable: {e}"), None))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StoreError::authentication(format!("failed to read token response: {e}"), None))?;

    if !status.is_success() {
        let body = body_to_json(&bytes);
        let reason = body
            .get("error_description")
            .or_else(|| body.get("error"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("token request rejected")
            .to_string();
        tracing::warn!(status = status.as_u16(), reason = %reason, "Token exchange failed");
        return Err(StoreError::authentication(reason, Some(status.as_u16())));
    }

    let token: TokenResponse = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::authentication(format!("invalid token response: {e}"), None))?;

    let expires_at = Some(token.expires_in)
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            StoreError::authentication(format!("invalid token lifetime: {}s", token.expires_in), None)
        })?;

    Ok(CachedToken { value: token.access_token, expires_at })
}
