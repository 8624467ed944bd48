//! Strava API integration: OAuth token handling and TCX upload.

use crate::storage::config::StravaSettings;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const AUTHORIZE_URL: &str = "https://www.strava.com/oauth/mobile/authorize";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const API_BASE_URL: &str = "https://www.strava.com/api/v3";

/// Requested OAuth scopes.
pub const SCOPES: &str = "activity:write,read";

/// Seconds of slack before a token counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Strava sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Strava client id/secret not configured")]
    NotConfigured,

    #[error("Authorization required")]
    AuthorizationRequired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Credential storage error: {0}")]
    CredentialError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// OAuth token pair as returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StravaToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as Unix seconds
    pub expires_at: i64,
}

impl StravaToken {
    /// Usable for at least another minute.
    pub fn is_fresh(&self, now_secs: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS > now_secs
    }

    /// Load a stored token; `Ok(None)` when none was saved.
    pub fn load(path: &Path) -> Result<Option<Self>, SyncError> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::CredentialError(e.to_string()))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SyncError::CredentialError(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::CredentialError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::CredentialError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| SyncError::CredentialError(e.to_string()))
    }
}

/// Response of `POST /uploads`. Strava processes uploads asynchronously.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub id: u64,
    pub status: Option<String>,
    pub error: Option<String>,
    pub activity_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiFault {
    message: Option<String>,
}

/// Strava API client.
pub struct StravaClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl StravaClient {
    pub fn new(settings: &StravaSettings) -> Result<Self, SyncError> {
        if !settings.is_configured() {
            return Err(SyncError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        })
    }

    /// URL the athlete opens to grant access.
    pub fn authorize_url(&self) -> Result<Url, SyncError> {
        authorize_url(&self.client_id, &self.redirect_uri)
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<StravaToken, SyncError> {
        tracing::info!("Exchanging Strava authorization code");
        self.token_request(&[("grant_type", "authorization_code"), ("code", code)])
            .await
    }

    /// Refresh an expired token.
    pub async fn refresh(&self, token: &StravaToken) -> Result<StravaToken, SyncError> {
        tracing::debug!("Refreshing Strava token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_str()),
        ])
        .await
        .map_err(|e| SyncError::RefreshFailed(e.to_string()))
    }

    /// Load the stored token, refreshing and re-saving it when stale.
    pub async fn ensure_token(&self, store: &Path) -> Result<StravaToken, SyncError> {
        let token = StravaToken::load(store)?.ok_or(SyncError::AuthorizationRequired)?;
        let now = chrono::Utc::now().timestamp();
        if token.is_fresh(now) {
            return Ok(token);
        }

        match self.refresh(&token).await {
            Ok(refreshed) => {
                refreshed.save(store)?;
                Ok(refreshed)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Err(e)
            }
        }
    }

    /// Upload a TCX document as a new activity.
    pub async fn upload_tcx(
        &self,
        token: &StravaToken,
        tcx: Vec<u8>,
        name: &str,
    ) -> Result<UploadResponse, SyncError> {
        let file = Part::bytes(tcx)
            .file_name("workout.tcx")
            .mime_str("application/xml")?;
        let form = Form::new()
            .part("file", file)
            .text("data_type", "tcx")
            .text("name", name.to_string());

        tracing::info!("Uploading '{}' to Strava", name);
        let response = self
            .http
            .post(format!("{}/uploads", API_BASE_URL))
            .bearer_auth(&token.access_token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::UploadFailed(fault_message(status, &body)));
        }

        let upload = parse_upload_response(&body)?;
        if let Some(error) = &upload.error {
            return Err(SyncError::UploadFailed(error.clone()));
        }
        tracing::info!(
            "Strava upload {} accepted: {}",
            upload.id,
            upload.status.as_deref().unwrap_or("pending")
        );
        Ok(upload)
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<StravaToken, SyncError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self.http.post(TOKEN_URL).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::ApiError(fault_message(status, &body)));
        }
        parse_token_response(&body)
    }
}

/// Build the mobile authorize URL.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url, SyncError> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("approval_prompt", "auto"),
            ("scope", SCOPES),
        ],
    )
    .map_err(|e| SyncError::ApiError(e.to_string()))
}

/// Parse a token endpoint body. Extra fields (athlete etc.) are ignored.
pub fn parse_token_response(body: &str) -> Result<StravaToken, SyncError> {
    serde_json::from_str(body).map_err(|e| SyncError::ApiError(format!("bad token response: {}", e)))
}

pub fn parse_upload_response(body: &str) -> Result<UploadResponse, SyncError> {
    serde_json::from_str(body).map_err(|e| SyncError::UploadFailed(format!("bad response: {}", e)))
}

fn fault_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<ApiFault>(body)
        .ok()
        .and_then(|fault| fault.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    format!("{}: {}", status, message)
}
