//! OAuth2 access tokens for Google APIs.
//!
//! Service accounts mint an RS256 JWT and exchange it at the token endpoint
//! (JWT bearer grant). Tokens are cached until a minute before expiry.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::SCOPES;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The parts of a service account JSON key we need.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    /// A pre-issued access token, e.g. from `gcloud auth print-access-token`.
    AccessToken(String),
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

pub struct GoogleAuth {
    credentials: Credentials,
    client: reqwest::Client,
    token_cache: RwLock<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(credentials: Credentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
            token_cache: RwLock::new(None),
        }
    }

    /// Get a valid access token, refreshing if expired.
    pub async fn access_token(&self) -> Result<String> {
        let key = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if Utc::now().timestamp() < cached.expires_at - 60 {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.token_cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if Utc::now().timestamp() < cached.expires_at - 60 {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.exchange(key).await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let now = Utc::now().timestamp();
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let jwt = sign_assertion(key, token_uri, now)?;

        debug!("Exchanging service account JWT for {}", key.client_email);

        let resp = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())])
            .send()
            .await
            .context("Token exchange request failed")?;

        let resp: TokenResponse = super::ensure_success(resp, "Token exchange")
            .await?
            .json()
            .await
            .context("Failed to parse token response")?;

        info!(
            "Obtained Google access token for {} (expires in {}s)",
            key.client_email, resp.expires_in
        );

        Ok(CachedToken {
            access_token: resp.access_token,
            expires_at: now + resp.expires_in,
        })
    }
}

fn claims<'a>(key: &'a ServiceAccountKey, token_uri: &'a str, now: i64) -> JwtClaims<'a> {
    JwtClaims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    }
}

fn sign_assertion(key: &ServiceAccountKey, token_uri: &str, now: i64) -> Result<String> {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("Invalid RSA private key in service account credentials")?;

    jsonwebtoken::encode(&header, &claims(key, token_uri, now), &encoding_key)
        .context("Failed to encode JWT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "intake@project.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            private_key_id: Some("abc123".to_string()),
            token_uri: None,
        }
    }

    #[tokio::test]
    async fn test_static_token_is_returned_verbatim() {
        let auth = GoogleAuth::new(
            Credentials::AccessToken("ya29.token".to_string()),
            reqwest::Client::new(),
        );
        assert_eq!(auth.access_token().await.unwrap(), "ya29.token");
    }

    #[test]
    fn test_claims_request_sheets_and_drive_scopes() {
        let key = key();
        let claims = serde_json::to_value(claims(&key, DEFAULT_TOKEN_URI, 1_000)).unwrap();
        assert_eq!(claims["iss"], "intake@project.iam.gserviceaccount.com");
        assert_eq!(claims["aud"], DEFAULT_TOKEN_URI);
        assert_eq!(claims["exp"], 1_000 + TOKEN_LIFETIME_SECS);
        let scope = claims["scope"].as_str().unwrap();
        assert!(scope.contains("auth/spreadsheets"));
        assert!(scope.contains("auth/drive.file"));
    }

    #[test]
    fn test_bad_private_key_is_an_error() {
        let err = sign_assertion(&key(), DEFAULT_TOKEN_URI, 0).unwrap_err();
        assert!(err.to_string().contains("Invalid RSA private key"));
    }
}
