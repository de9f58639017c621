//! Google Drive v3 client: folder lookup/creation and multipart file upload.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::auth::GoogleAuth;
use super::ensure_success;
use crate::form::Attachment;

const DRIVE_API_BASE: &str = "https://www.googleapis.com";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const BINARY_MIME_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}

impl DriveClient {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            client,
            auth,
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Look up a non-trashed folder by exact name directly under `parent_id`.
    pub async fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        let token = self.auth.access_token().await?;
        let query = folder_query(name, parent_id);
        debug!("Drive folder lookup: {}", query);

        let resp = self
            .client
            .get(format!("{}/drive/v3/files", self.base_url))
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to query Drive folders")?;

        let list: FileList = ensure_success(resp, "Folder lookup")
            .await?
            .json()
            .await
            .context("Failed to parse Drive file list")?;

        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    /// Create a folder under `parent_id` and return its id.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .post(format!("{}/drive/v3/files", self.base_url))
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await
            .context("Failed to send folder creation request")?;

        let created: FileRef = ensure_success(resp, "Folder creation")
            .await?
            .json()
            .await
            .context("Failed to parse created folder")?;

        info!("Created Drive folder '{}' ({})", name, created.id);
        Ok(created.id)
    }

    /// Upload one file's bytes as an opaque binary into `folder_id`.
    pub async fn upload_file(&self, folder_id: &str, file: &Attachment) -> Result<String> {
        let token = self.auth.access_token().await?;
        let boundary = format!("upload-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": file.filename,
            "parents": [folder_id],
        });
        // Drive's uploadType=multipart takes a multipart/related body (JSON
        // metadata part, then media part), not multipart/form-data.
        let body = multipart_related_body(&boundary, &metadata, &file.data);

        let resp = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", file.filename))?;

        let uploaded: FileRef = ensure_success(resp, "File upload")
            .await?
            .json()
            .await
            .context("Failed to parse uploaded file")?;

        debug!(
            "Uploaded '{}' ({} bytes) as {}",
            file.filename,
            file.data.len(),
            uploaded.id
        );
        Ok(uploaded.id)
    }
}

/// Shareable browser link for a folder.
pub fn folder_link(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", folder_id)
}

fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        FOLDER_MIME_TYPE,
        escape_query_value(parent_id)
    )
}

/// Drive query strings quote values with `'` and escape with `\`.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related_body(boundary: &str, metadata: &serde_json::Value, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", BINARY_MIME_TYPE).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
