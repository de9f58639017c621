//! Submission pipeline: optional attachment upload, then one spreadsheet row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::error::AppError;
use crate::feedback::{hyperlink_formula, FeedbackCategory, Submission};
use crate::storage::RemoteStorage;

const CREATED_AT_FORMAT: &str = "%H:%M:%S %d/%m/%Y";
const FOLDER_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct FeedbackService {
    storage: Arc<dyn RemoteStorage>,
    timezone: Tz,
}

impl FeedbackService {
    pub fn new(storage: Arc<dyn RemoteStorage>, timezone: Tz) -> Self {
        Self { storage, timezone }
    }

    /// Upload attachments (if any) and append the submission's row.
    ///
    /// Nothing is rolled back: a failed append leaves uploaded files behind.
    pub async fn submit<T: Submission>(&self, submission: &T) -> Result<(), AppError> {
        let category = T::CATEGORY;
        let now = Utc::now().with_timezone(&self.timezone);

        let image_urls = match submission.attachments() {
            [] => String::new(),
            files => {
                let link = self
                    .upload_attachments(category, submission.reference(), files, &now)
                    .await?;
                hyperlink_formula(&link)
            }
        };

        let row = submission.row(&image_urls, &now.format(CREATED_AT_FORMAT).to_string());
        let sheet = self.destination_sheet(category).await?;
        self.storage.append_row(&sheet, &row).await?;

        info!(
            "Recorded {} submission in sheet '{}' ({} attachment(s))",
            category,
            sheet,
            submission.attachments().len()
        );
        Ok(())
    }

    async fn upload_attachments(
        &self,
        category: FeedbackCategory,
        reference: Option<&str>,
        files: &[crate::form::Attachment],
        now: &DateTime<Tz>,
    ) -> Result<String, AppError> {
        let parent_id = self
            .storage
            .get_or_create_folder(category.folder_name())
            .await?;
        let name = submission_folder_name(category, reference, now);
        let folder_id = self
            .storage
            .create_submission_folder(&parent_id, &name)
            .await?;
        Ok(self.storage.upload_files(&folder_id, files).await?)
    }

    async fn destination_sheet(&self, category: FeedbackCategory) -> Result<String, AppError> {
        if let Some(name) = category.sheet_name() {
            return Ok(name.to_string());
        }
        self.storage
            .first_sheet_title()
            .await?
            .ok_or_else(|| AppError::InvalidData("No sheet found in the spreadsheet.".to_string()))
    }
}

/// `<Category> - <reference> - <stamp>`, or `<Category> - <stamp>` without a
/// reference.
fn submission_folder_name(
    category: FeedbackCategory,
    reference: Option<&str>,
    now: &DateTime<Tz>,
) -> String {
    let stamp = now.format(FOLDER_STAMP_FORMAT);
    match reference {
        Some(reference) => format!("{} - {} - {}", category, reference, stamp),
        None => format!("{} - {}", category, stamp),
    }
}
