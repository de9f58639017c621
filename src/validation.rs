//! Field-level and cross-field validation for incoming submissions.
//!
//! Pure functions, no async and no I/O. Each rule returns the first failure
//! it finds; callers chain them in priority order with `?`.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::error;

/// Vietnamese mobile numbers: optional `+84`/`84`/`0` prefix, a carrier digit
/// from {2,3,5,7,8,9}, then exactly eight digits.
const PHONE_PATTERN: &str = r"^(?:\+?84|0)?[235789][0-9]{8}$";
const EMAIL_PATTERN: &str = r"^[\w.-]+@[\w.-]+\.\w{2,4}$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingContact,
    BlankField,
    InvalidPhone,
    InvalidEmail,
}

/// A rejected field, with the message returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, field: &'static str, message: impl Into<String>) -> Self {
        let err = Self {
            kind,
            field,
            message: message.into(),
        };
        error!(field = err.field, kind = ?err.kind, "Validation failed: {}", err.message);
        err
    }
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PHONE_PATTERN).expect("phone pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

/// Collapse empty or whitespace-only values to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// At least one way to reach the submitter must be given.
pub fn require_contact(
    phone_number: Option<&str>,
    email: Option<&str>,
) -> Result<(), ValidationError> {
    let blank = |v: Option<&str>| v.map_or(true, |s| s.trim().is_empty());
    if blank(phone_number) && blank(email) {
        return Err(ValidationError::new(
            ValidationErrorKind::MissingContact,
            "phone_number",
            "Phone number or email must not be empty.",
        ));
    }
    Ok(())
}

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(
            ValidationErrorKind::BlankField,
            field,
            format!("{} must not be blank.", field),
        ));
    }
    Ok(())
}

pub fn check_phone_number(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(phone) if !phone_regex().is_match(phone.trim()) => Err(ValidationError::new(
            ValidationErrorKind::InvalidPhone,
            "phone_number",
            "Phone number is not a valid Vietnamese number.",
        )),
        _ => Ok(()),
    }
}

pub fn check_email(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(email) if !email_regex().is_match(email.trim()) => Err(ValidationError::new(
            ValidationErrorKind::InvalidEmail,
            "email",
            "Invalid email.",
        )),
        _ => Ok(()),
    }
}

/// Run every rule in priority order: contact presence, required text fields
/// (in the order given), phone format, email format.
pub fn validate_submission(
    phone_number: Option<&str>,
    email: Option<&str>,
    required: &[(&'static str, &str)],
) -> Result<(), ValidationError> {
    require_contact(phone_number, email)?;
    for (field, value) in required {
        require_text(field, value)?;
    }
    check_phone_number(phone_number)?;
    check_email(email)?;
    Ok(())
}
