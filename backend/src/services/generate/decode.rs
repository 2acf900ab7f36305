//! Multipart decoding for the generation endpoint.
//!
//! Parts with a filename are streamed to temporary files, everything else is
//! collected as UTF-8 text. The temporary files are owned by the returned
//! [`DecodedForm`] and removed when it is dropped.

use super::error::GenerateError;
use crate::config::Config;
use actix_multipart::Multipart;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// An uploaded file held in a temporary location.
#[derive(Debug)]
pub struct UploadedFile {
    file: NamedTempFile,
    size: u64,
    original_name: Option<String>,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct DecodedForm {
    pub fields: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<UploadedFile>>,
}

impl DecodedForm {
    /// First value sent for a text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Removes and returns the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        }
    }
}

/// Reads the whole multipart body, enforcing the configured size ceilings.
pub async fn decode(mut payload: Multipart, config: &Config) -> Result<DecodedForm, GenerateError> {
    let mut form = DecodedForm::default();
    let mut file_bytes = 0u64;
    let mut field_bytes = 0u64;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().map(|n| n.to_string()),
                cd.get_filename().map(|f| f.to_string()),
            ),
            None => (None, None),
        };
        let Some(name) = name else {
            log::debug!("skipping multipart part without a name");
            continue;
        };

        if filename.is_some() {
            let file = NamedTempFile::new()?;
            let mut writer = tokio::fs::File::from_std(file.as_file().try_clone()?);
            let mut size = 0u64;

            while let Some(chunk) = field.next().await {
                let chunk = chunk?;
                size += chunk.len() as u64;
                file_bytes += chunk.len() as u64;
                if file_bytes > config.max_file_size {
                    return Err(GenerateError::FileTooLarge {
                        limit: config.max_file_size,
                    });
                }
                writer.write_all(&chunk).await?;
            }
            writer.flush().await?;

            if size == 0 && filename.as_deref() == Some("") {
                log::debug!("ignoring empty file part '{name}' without a filename");
                continue;
            }
            log::debug!("received file part '{name}' ({size} bytes)");
            form.files.entry(name).or_default().push(UploadedFile {
                file,
                size,
                original_name: filename,
            });
        } else {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk?;
                field_bytes += chunk.len() as u64;
                if field_bytes > config.max_fields_size {
                    return Err(GenerateError::FieldsTooLarge {
                        limit: config.max_fields_size,
                    });
                }
                bytes.extend_from_slice(&chunk);
            }
            let value =
                String::from_utf8(bytes).map_err(|_| GenerateError::InvalidField { name: name.clone() })?;
            form.fields.entry(name).or_default().push(value);
        }
    }

    Ok(form)
}
