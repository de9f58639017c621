//! Remote storage abstraction: spreadsheet rows plus Drive folders and files.
//!
//! [`RemoteStorage`] is the seam the submission service talks to;
//! [`GoogleStorage`] backs it with the Sheets and Drive REST clients.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::form::Attachment;
use crate::google::drive::{folder_link, DriveClient};
use crate::google::sheets::SheetsClient;

/// A failed remote call. Carries the provider message; the kind of failure
/// (sheet creation, upload, ...) is not distinguished.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StorageError(String);

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Title of the first tab, if the spreadsheet has any.
    async fn first_sheet_title(&self) -> Result<Option<String>, StorageError>;

    /// Append one row to `sheet_name`, creating the tab when absent.
    async fn append_row(&self, sheet_name: &str, row: &[String]) -> Result<(), StorageError>;

    /// Id of the top-level folder called `name`, created on first use.
    async fn get_or_create_folder(&self, name: &str) -> Result<String, StorageError>;

    /// Always creates a new folder under `parent_id`.
    async fn create_submission_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<String, StorageError>;

    /// Upload every file into `folder_id` and return a shareable folder link.
    /// Stops at the first failure; earlier uploads are left in place.
    async fn upload_files(
        &self,
        folder_id: &str,
        files: &[Attachment],
    ) -> Result<String, StorageError>;
}

pub struct GoogleStorage {
    sheets: SheetsClient,
    drive: DriveClient,
    root_folder_id: String,
    /// Serializes top-level folder get-or-create within this process.
    folder_lock: Mutex<()>,
}

impl GoogleStorage {
    pub fn new(sheets: SheetsClient, drive: DriveClient, root_folder_id: impl Into<String>) -> Self {
        Self {
            sheets,
            drive,
            root_folder_id: root_folder_id.into(),
            folder_lock: Mutex::new(()),
        }
    }
}

fn remote(operation: &'static str) -> impl FnOnce(anyhow::Error) -> StorageError {
    move |err| {
        error!("Remote storage {} failed: {:#}", operation, err);
        StorageError::new(format!("{:#}", err))
    }
}

#[async_trait]
impl RemoteStorage for GoogleStorage {
    async fn first_sheet_title(&self) -> Result<Option<String>, StorageError> {
        let titles = self
            .sheets
            .sheet_titles()
            .await
            .map_err(remote("sheet lookup"))?;
        Ok(titles.into_iter().next())
    }

    async fn append_row(&self, sheet_name: &str, row: &[String]) -> Result<(), StorageError> {
        self.sheets
            .append_row(sheet_name, row)
            .await
            .map_err(remote("row append"))
    }

    async fn get_or_create_folder(&self, name: &str) -> Result<String, StorageError> {
        let _guard = self.folder_lock.lock().await;

        if let Some(id) = self
            .drive
            .find_folder(name, &self.root_folder_id)
            .await
            .map_err(remote("folder lookup"))?
        {
            debug!("Reusing Drive folder '{}' ({})", name, id);
            return Ok(id);
        }

        info!("Drive folder '{}' not found, creating it", name);
        self.drive
            .create_folder(name, &self.root_folder_id)
            .await
            .map_err(remote("folder creation"))
    }

    async fn create_submission_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<String, StorageError> {
        self.drive
            .create_folder(name, parent_id)
            .await
            .map_err(remote("folder creation"))
    }

    async fn upload_files(
        &self,
        folder_id: &str,
        files: &[Attachment],
    ) -> Result<String, StorageError> {
        for file in files {
            debug!(
                "Uploading '{}' ({}) to {}",
                file.filename,
                file.content_type.as_deref().unwrap_or("unknown type"),
                folder_id
            );
            self.drive
                .upload_file(folder_id, file)
                .await
                .map_err(remote("file upload"))?;
        }
        info!("Uploaded {} file(s) to folder {}", files.len(), folder_id);
        Ok(folder_link(folder_id))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::auth::{Credentials, GoogleAuth};
    use crate::google::mock::{self, MockGoogle};
    use std::sync::Arc;

    fn storage(base: &str) -> GoogleStorage {
        let http = reqwest::Client::new();
        let auth = Arc::new(GoogleAuth::new(
            Credentials::AccessToken("test-token".to_string()),
            http.clone(),
        ));
        GoogleStorage::new(
            SheetsClient::new(http.clone(), auth.clone(), "sheet-1").with_base_url(base),
            DriveClient::new(http, auth).with_base_url(base),
            "root",
        )
    }

    fn file(name: &str) -> Attachment {
        Attachment {
            filename: name.to_string(),
            content_type: None,
            data: b"bytes".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_folder_is_idempotent() {
        let (base, state) = mock::spawn(MockGoogle::default()).await;
        let storage = storage(&base);

        let first = storage.get_or_create_folder("Warranty").await.unwrap();
        let second = storage.get_or_create_folder("Warranty").await.unwrap();

        assert_eq!(first, second);
        let state = state.lock().unwrap();
        assert_eq!(state.folder_creates, 1);
        assert_eq!(state.folders[0].parent, "root");
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_creates_once() {
        let (base, state) = mock::spawn(MockGoogle::default()).await;
        let storage = Arc::new(storage(&base));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.get_or_create_folder("Complaint").await })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(state.lock().unwrap().folder_creates, 1);
    }

    #[tokio::test]
    async fn test_submission_folder_is_never_reused() {
        let (base, _state) = mock::spawn(MockGoogle::default()).await;
        let storage = storage(&base);

        let a = storage.create_submission_folder("p", "Complaint - CV1").await.unwrap();
        let b = storage.create_submission_folder("p", "Complaint - CV1").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_partial_upload_failure_keeps_earlier_files() {
        let (base, state) = mock::spawn(MockGoogle {
            upload_limit: Some(1),
            ..Default::default()
        })
        .await;
        let storage = storage(&base);

        let err = storage
            .upload_files("folder-x", &[file("a.jpg"), file("b.jpg"), file("c.jpg")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota"), "{}", err);
        let state = state.lock().unwrap();
        assert_eq!(state.uploads, vec![("folder-x".to_string(), "a.jpg".to_string())]);
    }

    #[tokio::test]
    async fn test_upload_returns_folder_link() {
        let (base, _state) = mock::spawn(MockGoogle::default()).await;
        let link = storage(&base)
            .upload_files("folder-x", &[file("a.jpg")])
            .await
            .unwrap();
        assert_eq!(link, "https://drive.google.com/drive/folders/folder-x");
    }

    #[tokio::test]
    async fn test_first_sheet_title() {
        let (base, _state) = mock::spawn(MockGoogle {
            sheets: vec!["Góp ý".to_string(), "Complaint".to_string()],
            ..Default::default()
        })
        .await;
        assert_eq!(
            storage(&base).first_sheet_title().await.unwrap().as_deref(),
            Some("Góp ý")
        );

        let (empty, _state) = mock::spawn(MockGoogle::default()).await;
        assert_eq!(storage(&empty).first_sheet_title().await.unwrap(), None);
    }
}
