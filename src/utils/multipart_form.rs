use crate::assessment::ImagePayload;
use crate::error::LedgerError;
use actix_multipart::Multipart;
use futures_util::TryStreamExt;
use std::collections::HashMap;

/// Text fields are small; anything larger is rejected.
const MAX_TEXT_BYTES: usize = 4 * 1024;

/// Buffered multipart body: named text fields plus named file parts.
#[derive(Debug, Default)]
pub struct FormData {
    texts: HashMap<String, String>,
    files: HashMap<String, ImagePayload>,
}

impl FormData {
    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<ImagePayload> {
        self.files.remove(name).filter(|f| !f.bytes.is_empty())
    }
}

/// Reads the whole multipart stream. Parts named in `file_fields` are kept
/// as bytes (capped at `max_file_bytes`), everything else as UTF-8 text.
pub async fn read_form(
    mut payload: Multipart,
    file_fields: &[&str],
    max_file_bytes: usize,
) -> actix_web::Result<FormData> {
    let mut form = FormData::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let is_file = file_fields.contains(&name.as_str());
        let limit = if is_file { max_file_bytes } else { MAX_TEXT_BYTES };
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(LedgerError::validation([name]).into());
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_file {
            form.files.insert(name, ImagePayload { bytes, content_type });
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| LedgerError::validation([name.clone()]))?;
            form.texts.insert(name, value);
        }
    }

    Ok(form)
}
