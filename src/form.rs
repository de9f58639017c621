//! Request body decoding shared by every submission endpoint.
//!
//! Accepts `multipart/form-data` (text fields plus repeated `files` parts),
//! `application/x-www-form-urlencoded`, or a flat JSON object.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form, Json,
};
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::validation::non_blank;

/// Name of the multipart field carrying attachments.
pub const FILES_FIELD: &str = "files";

/// One uploaded file, held in memory for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Undecoded submission: text fields by name plus any attachments.
#[derive(Debug, Default)]
pub struct RawForm {
    fields: HashMap<String, String>,
    files: Vec<Attachment>,
}

impl RawForm {
    pub fn new(fields: HashMap<String, String>, files: Vec<Attachment>) -> Self {
        Self { fields, files }
    }

    /// Take a field that must be present (it may still be blank; blankness is
    /// a validation concern).
    pub fn required(&mut self, field: &'static str) -> Result<String, AppError> {
        self.fields
            .remove(field)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| AppError::Decode(format!("field required: {}", field)))
    }

    /// Take an optional field; blank values count as absent.
    pub fn optional(&mut self, field: &str) -> Option<String> {
        non_blank(self.fields.remove(field)).map(|v| v.trim().to_string())
    }

    /// Take a required field and parse it into a closed set of labels.
    pub fn choice<T>(&mut self, field: &'static str, permitted: &[T]) -> Result<T, AppError>
    where
        T: Copy + std::fmt::Display + std::str::FromStr,
    {
        let raw = self.required(field)?;
        raw.parse().map_err(|_| {
            let labels: Vec<String> = permitted.iter().map(|p| format!("'{}'", p)).collect();
            AppError::Decode(format!(
                "value is not a valid enumeration member; permitted: {}: {}",
                labels.join(", "),
                field
            ))
        })
    }

    pub fn take_files(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.files)
    }

    fn from_json(body: serde_json::Map<String, Value>) -> Result<Self, AppError> {
        let mut fields = HashMap::new();
        for (key, value) in body {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(AppError::Decode(format!("str type expected: {}", key)));
                }
            };
            fields.insert(key, text);
        }
        Ok(Self::new(fields, Vec::new()))
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Decode(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == FILES_FIELD {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Decode(format!("Failed to read file: {}", e)))?
                    .to_vec();

                // An untouched file input still sends an empty part.
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                debug!("Received attachment '{}' ({} bytes)", filename, data.len());
                form.files.push(Attachment {
                    filename: if filename.is_empty() {
                        format!("attachment-{}", form.files.len() + 1)
                    } else {
                        filename
                    },
                    content_type,
                    data,
                });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Decode(format!("Failed to read field {}: {}", name, e)))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for RawForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Decode(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<serde_json::Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::Decode(e.body_text()))?;
            Self::from_json(body)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::Decode(e.body_text()))?;
            Ok(Self::new(fields, Vec::new()))
        } else {
            Err(AppError::Decode(format!(
                "Unsupported content type: '{}'",
                content_type
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_form(value: Value) -> RawForm {
        match value {
            Value::Object(map) => RawForm::from_json(map).unwrap(),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_json_scalars_become_text() {
        let mut form = json_form(json!({
            "full_name": "Nguyen Van A",
            "phone_number": 912345678,
            "email": null,
        }));
        assert_eq!(form.optional("phone_number").as_deref(), Some("912345678"));
        assert_eq!(form.optional("email"), None);
        assert_eq!(form.required("full_name").unwrap(), "Nguyen Van A");
    }

    #[test]
    fn test_json_nested_values_rejected() {
        let map = match json!({ "content": ["a"] }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let err = RawForm::from_json(map).unwrap_err();
        assert_eq!(err.public_message(), "str type expected: content");
    }

    #[test]
    fn test_missing_required_field() {
        let mut form = RawForm::default();
        let err = form.required("conversation_code").unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
        assert_eq!(err.public_message(), "field required: conversation_code");
    }

    #[test]
    fn test_blank_required_field_is_kept_for_validation() {
        let mut form = json_form(json!({ "content": "   " }));
        assert_eq!(form.required("content").unwrap(), "");
    }

    #[test]
    fn test_optional_trims() {
        let mut form = json_form(json!({ "email": "  a@b.vn " }));
        assert_eq!(form.optional("email").as_deref(), Some("a@b.vn"));
    }
}
