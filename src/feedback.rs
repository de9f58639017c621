//! Submission categories, their typed payloads and spreadsheet row layout.

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::form::{Attachment, RawForm};
use crate::validation::{require_contact, validate_submission};

/// Label shown for the attachments hyperlink cell.
const ATTACHMENTS_LABEL: &str = "Xem tệp đính kèm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCategory {
    General,
    Consultation,
    Warranty,
    Complaint,
}

impl FeedbackCategory {
    /// Fixed destination tab. General feedback goes to whichever tab comes
    /// first in the spreadsheet.
    pub fn sheet_name(self) -> Option<&'static str> {
        match self {
            Self::General => None,
            Self::Consultation => Some("Consultation"),
            Self::Warranty => Some("Warranty"),
            Self::Complaint => Some("Complaint"),
        }
    }

    /// Top-level Drive folder collecting this category's attachments.
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::General => "Feedback",
            Self::Consultation => "Consultation",
            Self::Warranty => "Warranty",
            Self::Complaint => "Complaint",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Self::General => "Gửi phản hồi góp ý thành công",
            Self::Consultation => "Gửi yêu cầu tư vấn thành công",
            Self::Warranty => "Gửi yêu cầu bảo hành thành công",
            Self::Complaint => "Gửi khiếu nại thành công",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Parse error for the closed label sets below.
#[derive(Debug)]
pub struct UnknownLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgencyLevel {
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Cao",
            Self::Medium => "Trung Bình",
            Self::Low => "Thấp",
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UrgencyLevel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.label() == s)
            .ok_or(UnknownLabel)
    }
}

/// Product lines a customer can ask about or claim warranty on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Chatbot,
    Retail,
    Ocr,
    Chiboso,
}

impl Service {
    pub const ALL: [Self; 4] = [Self::Chatbot, Self::Retail, Self::Ocr, Self::Chiboso];

    pub fn label(self) -> &'static str {
        match self {
            Self::Chatbot => "Chatbot",
            Self::Retail => "Retail",
            Self::Ocr => "OCR",
            Self::Chiboso => "Chiboso",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Service {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.label() == s)
            .ok_or(UnknownLabel)
    }
}

/// A decoded and validated submission of one category.
pub trait Submission: Send + Sync {
    const CATEGORY: FeedbackCategory;

    /// Conversation code used in per-submission folder names.
    fn reference(&self) -> Option<&str>;

    fn attachments(&self) -> &[Attachment] {
        &[]
    }

    /// Cells in sheet column order. `image_urls` is only written by
    /// categories that accept attachments.
    fn row(&self, image_urls: &str, created_at: &str) -> Vec<String>;
}

/// Take `phone_number` and `email` and check that one of them is given.
/// Runs before any other field is decoded, so a missing contact is reported
/// even when the rest of the body is incomplete.
fn take_contact(form: &mut RawForm) -> Result<(Option<String>, Option<String>), AppError> {
    let phone_number = form.optional("phone_number");
    let email = form.optional("email");
    require_contact(phone_number.as_deref(), email.as_deref())?;
    Ok((phone_number, email))
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

#[derive(Debug)]
pub struct GeneralFeedback {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub content: String,
    pub files: Vec<Attachment>,
}

impl TryFrom<RawForm> for GeneralFeedback {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let (phone_number, email) = take_contact(&mut form)?;
        let submission = Self {
            full_name: form.optional("full_name"),
            phone_number,
            email,
            content: form.required("content")?,
            files: form.take_files(),
        };
        validate_submission(
            submission.phone_number.as_deref(),
            submission.email.as_deref(),
            &[("content", submission.content.as_str())],
        )?;
        Ok(submission)
    }
}

impl Submission for GeneralFeedback {
    const CATEGORY: FeedbackCategory = FeedbackCategory::General;

    fn reference(&self) -> Option<&str> {
        None
    }

    fn attachments(&self) -> &[Attachment] {
        &self.files
    }

    fn row(&self, image_urls: &str, created_at: &str) -> Vec<String> {
        vec![
            cell(&self.full_name),
            cell(&self.phone_number),
            cell(&self.email),
            self.content.clone(),
            image_urls.to_string(),
            created_at.to_string(),
        ]
    }
}

#[derive(Debug)]
pub struct ConsultationRequest {
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub conversation_code: String,
    pub product_interest: Service,
    pub conversation_summary: String,
}

impl TryFrom<RawForm> for ConsultationRequest {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let (phone_number, email) = take_contact(&mut form)?;
        let submission = Self {
            full_name: form.required("full_name")?,
            phone_number,
            email,
            conversation_code: form.required("conversation_code")?,
            product_interest: form.choice("product_interest", &Service::ALL)?,
            conversation_summary: form.required("conversation_summary")?,
        };
        validate_submission(
            submission.phone_number.as_deref(),
            submission.email.as_deref(),
            &[
                ("full_name", submission.full_name.as_str()),
                ("conversation_code", submission.conversation_code.as_str()),
                ("conversation_summary", submission.conversation_summary.as_str()),
            ],
        )?;
        Ok(submission)
    }
}

impl Submission for ConsultationRequest {
    const CATEGORY: FeedbackCategory = FeedbackCategory::Consultation;

    fn reference(&self) -> Option<&str> {
        Some(&self.conversation_code)
    }

    fn row(&self, _image_urls: &str, created_at: &str) -> Vec<String> {
        vec![
            self.full_name.clone(),
            cell(&self.phone_number),
            cell(&self.email),
            self.conversation_code.clone(),
            self.product_interest.to_string(),
            self.conversation_summary.clone(),
            created_at.to_string(),
        ]
    }
}

#[derive(Debug)]
pub struct WarrantyClaim {
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub conversation_code: String,
    pub product_type: Service,
    pub start_date: String,
    pub issue_description: String,
    pub files: Vec<Attachment>,
}

impl TryFrom<RawForm> for WarrantyClaim {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let (phone_number, email) = take_contact(&mut form)?;
        let submission = Self {
            full_name: form.required("full_name")?,
            phone_number,
            email,
            conversation_code: form.required("conversation_code")?,
            product_type: form.choice("product_type", &Service::ALL)?,
            start_date: form.required("start_date")?,
            issue_description: form.required("issue_description")?,
            files: form.take_files(),
        };
        validate_submission(
            submission.phone_number.as_deref(),
            submission.email.as_deref(),
            &[
                ("full_name", submission.full_name.as_str()),
                ("conversation_code", submission.conversation_code.as_str()),
                ("start_date", submission.start_date.as_str()),
                ("issue_description", submission.issue_description.as_str()),
            ],
        )?;
        Ok(submission)
    }
}

impl Submission for WarrantyClaim {
    const CATEGORY: FeedbackCategory = FeedbackCategory::Warranty;

    fn reference(&self) -> Option<&str> {
        Some(&self.conversation_code)
    }

    fn attachments(&self) -> &[Attachment] {
        &self.files
    }

    fn row(&self, image_urls: &str, created_at: &str) -> Vec<String> {
        vec![
            self.full_name.clone(),
            cell(&self.phone_number),
            cell(&self.email),
            self.conversation_code.clone(),
            self.product_type.to_string(),
            self.start_date.clone(),
            self.issue_description.clone(),
            image_urls.to_string(),
            created_at.to_string(),
        ]
    }
}

#[derive(Debug)]
pub struct Complaint {
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub conversation_code: String,
    pub complaint_issue: String,
    pub urgency_level: UrgencyLevel,
    pub files: Vec<Attachment>,
}

impl TryFrom<RawForm> for Complaint {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let (phone_number, email) = take_contact(&mut form)?;
        let submission = Self {
            full_name: form.required("full_name")?,
            phone_number,
            email,
            conversation_code: form.required("conversation_code")?,
            complaint_issue: form.required("complaint_issue")?,
            urgency_level: form.choice("urgency_level", &UrgencyLevel::ALL)?,
            files: form.take_files(),
        };
        validate_submission(
            submission.phone_number.as_deref(),
            submission.email.as_deref(),
            &[
                ("full_name", submission.full_name.as_str()),
                ("conversation_code", submission.conversation_code.as_str()),
                ("complaint_issue", submission.complaint_issue.as_str()),
            ],
        )?;
        Ok(submission)
    }
}

impl Submission for Complaint {
    const CATEGORY: FeedbackCategory = FeedbackCategory::Complaint;

    fn reference(&self) -> Option<&str> {
        Some(&self.conversation_code)
    }

    fn attachments(&self) -> &[Attachment] {
        &self.files
    }

    fn row(&self, image_urls: &str, created_at: &str) -> Vec<String> {
        vec![
            self.full_name.clone(),
            cell(&self.phone_number),
            cell(&self.email),
            self.conversation_code.clone(),
            self.complaint_issue.clone(),
            self.urgency_level.to_string(),
            image_urls.to_string(),
            created_at.to_string(),
        ]
    }
}

/// Sheets formula linking to `url`; quotes are doubled per formula syntax.
pub fn hyperlink_formula(url: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\", \"{}\")",
        url.replace('"', "\"\""),
        ATTACHMENTS_LABEL
    )
}
