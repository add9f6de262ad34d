use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{error::AppError, media::Upload};

/// Name of the single file field accepted by upload forms.
pub const FILE_FIELD: &str = "file";

/// A parsed multipart form: text fields plus at most one file.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl MultipartForm {
    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Malformed form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().map(str::to_owned);
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Could not read file: {e}")))?;
                // Browsers send an empty part when no file was chosen.
                if !body.is_empty() {
                    form.file = Some(Upload {
                        body,
                        content_type,
                        file_name,
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Malformed form field {name}: {e}")))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Raw text value, untrimmed. Used for passwords.
    pub fn raw(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn with_fields(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file: None,
        }
    }
}
