//! Failure modes of `POST /api/generate` and their HTTP mapping.
//!
//! Every variant becomes a `400 Bad Request` with an [`ErrorBody`]; the
//! message wording is part of the public contract.

use crate::docx::{ContainerError, TemplateError};
use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use docgen_common::model::error_body::ErrorBody;
use thiserror::Error;

/// Fallback message for failures without a more specific one.
pub const GENERIC_FAILURE: &str = "Failed to process request";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("File too large (max {}MB)", .limit / (1024 * 1024))]
    FileTooLarge { limit: u64 },

    #[error("form fields exceed {limit} bytes")]
    FieldsTooLarge { limit: u64 },

    #[error("field '{name}' is not valid UTF-8")]
    InvalidField { name: String },

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Missing 'template' file")]
    MissingTemplate,

    #[error("Invalid JSON in 'data' field")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Unable to read uploaded file")]
    UnreadableUpload(#[source] std::io::Error),

    #[error("Invalid DOCX template (file is not a valid .docx)")]
    InvalidContainer(#[source] ContainerError),

    #[error("Invalid DOCX template")]
    InvalidTemplate(#[source] TemplateError),

    #[error("{0}")]
    Render(#[source] TemplateError),

    #[error("failed to write generated document: {0}")]
    Serialize(#[source] ContainerError),

    #[error("i/o error while decoding upload: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerateError {
    /// The body sent to the client. Internal failures collapse to the generic
    /// message without details.
    pub fn body(&self) -> ErrorBody {
        match self {
            GenerateError::FileTooLarge { .. }
            | GenerateError::MissingTemplate
            | GenerateError::InvalidJson(_)
            | GenerateError::UnreadableUpload(_)
            | GenerateError::Render(_) => ErrorBody::new(self.to_string()),
            GenerateError::InvalidContainer(source) => {
                ErrorBody::new(self.to_string()).with_details(source.to_string())
            }
            GenerateError::InvalidTemplate(source) => {
                ErrorBody::new(self.to_string()).with_details(source.to_string())
            }
            GenerateError::FieldsTooLarge { .. }
            | GenerateError::InvalidField { .. }
            | GenerateError::Multipart(_)
            | GenerateError::Serialize(_)
            | GenerateError::Io(_) => ErrorBody::new(GENERIC_FAILURE),
        }
    }
}

impl ResponseError for GenerateError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        log::warn!("generation rejected: {self}");
        HttpResponse::build(self.status_code()).json(self.body())
    }
}
