//! Google Workspace REST clients (Sheets v4, Drive v3) sharing one
//! service-account authenticator.

pub mod auth;
pub mod drive;
pub mod sheets;

use anyhow::Result;
use serde::Deserialize;

/// OAuth scopes requested for the service account.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Turn a non-2xx Google API response into an error carrying the provider
/// message (or the raw body when it is not the usual `{"error": {...}}`).
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);
    anyhow::bail!("{} failed ({}): {}", what, status, message)
}
