//! Stored-token authorization for the spreadsheet and document APIs.
//!
//! The token file uses the same field names google-auth writes, so an
//! existing `token.json` from an out-of-band consent flow works as-is.
//! Expired access tokens are refreshed automatically; anything beyond
//! that (revoked refresh token, missing file) requires re-authorization
//! outside this tool.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Refresh this many seconds before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth token payload, compatible with google-auth `Credentials.to_json()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default, alias = "email")]
    pub account: Option<String>,
}

impl StoredToken {
    /// True when the token is past (or within the margin of) its expiry.
    /// A missing or unparseable expiry counts as expired so we try a refresh.
    pub fn is_expired(&self) -> bool {
        match &self.expiry {
            None => true,
            Some(expiry_str) => {
                match chrono::DateTime::parse_from_rfc3339(&expiry_str.replace('Z', "+00:00"))
                    .or_else(|_| chrono::DateTime::parse_from_rfc3339(expiry_str))
                {
                    Ok(expiry) => {
                        expiry <= chrono::Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
                    }
                    Err(_) => true,
                }
            }
        }
    }
}

/// Loads the stored token and hands out valid bearer tokens, refreshing
/// when needed. Shared by the spreadsheet and document clients.
pub struct TokenManager {
    client: reqwest::Client,
    path: PathBuf,
    token: Mutex<StoredToken>,
}

impl TokenManager {
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Authorization token not found at {:?}; complete the consent flow out of band and place the token file there",
                path
            );
        }

        let content = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let token: StoredToken =
            serde_json::from_str(&content).context("Failed to parse token file")?;

        info!(
            "Loaded authorization token for {}",
            token.account.as_deref().unwrap_or("unknown account")
        );

        Ok(Self {
            client: reqwest::Client::new(),
            path,
            token: Mutex::new(token),
        })
    }

    /// Returns a currently valid access token, refreshing it first if the
    /// stored one is expired. The refreshed token is persisted back to disk.
    pub async fn bearer(&self) -> Result<String> {
        let mut token = self.token.lock().await;

        if !token.is_expired() {
            return Ok(token.token.clone());
        }

        debug!("Access token expired, refreshing");
        let refreshed = self.refresh(&token).await?;
        self.persist(&refreshed)?;
        *token = refreshed;
        Ok(token.token.clone())
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            anyhow!("Token is expired and has no refresh token; re-authorization required")
        })?;

        let mut form = vec![
            ("client_id", token.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = token.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&token.token_uri)
            .form(&form)
            .send()
            .await
            .context("Failed to reach the token endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token endpoint response")?;

        if !status.is_success() {
            if body.contains("invalid_grant") {
                bail!("Refresh token rejected; re-authorization required");
            }
            bail!("Token refresh failed with status {}: {}", status, body);
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&body).context("Failed to parse token refresh response")?;
        let access_token = parsed["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("No access_token in refresh response"))?;
        let expires_in = parsed["expires_in"].as_u64().unwrap_or(3600);
        let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

        let mut refreshed = token.clone();
        refreshed.token = access_token.to_string();
        refreshed.expiry = Some(expiry.to_rfc3339());

        info!("Access token refreshed, valid for {}s", expires_in);
        Ok(refreshed)
    }

    fn persist(&self, token: &StoredToken) -> Result<()> {
        let content =
            serde_json::to_string_pretty(token).context("Failed to serialize token")?;
        std::fs::write(&self.path, content).context("Failed to write token file")?;
        Ok(())
    }
}
