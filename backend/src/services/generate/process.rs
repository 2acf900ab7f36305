//! # Document Generation Handler
//!
//! Backs `POST /api/generate`. The request is handled in one linear pass:
//!
//! 1.  **Decode**: the multipart body is read by [`decode`], which stores the
//!     uploaded template in a temporary file.
//! 2.  **Fields**: the `template` file is required; `data` is optional JSON and
//!     defaults to an empty object; `outputFileName` names the download.
//! 3.  **Container**: the uploaded bytes are opened as a zip package.
//! 4.  **Template**: the WordprocessingML parts are compiled with `[[`/`]]`
//!     delimiters, paragraph loops and line breaks enabled.
//! 5.  **Render**: the payload is normalized (empty values become a single
//!     space) and substituted; tags with no value are written back as
//!     `[[tag]]` so missing data stays visible.
//! 6.  **Respond**: the package is serialized and returned as an attachment.
//!
//! Each stage maps its failure to a [`GenerateError`]; the temporary file is
//! removed when the decoded form goes out of scope, whatever the outcome.

use super::decode::{decode, DecodedForm};
use super::error::GenerateError;
use super::normalize::normalize;
use crate::config::Config;
use crate::docx::{Container, Delimiters, DocxTemplate, KeyLookup, PreserveTag, TemplateOptions};
use actix_multipart::Multipart;
use actix_web::body::BoxBody;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use docgen_common::requests::{
    DATA_FIELD, DEFAULT_OUTPUT_NAME, DOCX_CONTENT_TYPE, OUTPUT_FILE_NAME_FIELD, TEMPLATE_FIELD,
};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Anything that cannot appear inside a quoted header value.
static UNSAFE_FILE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\x20-\x7E]|["\\]"#).expect("valid file name pattern"));

/// A rendered document ready to be sent to the client.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub file_name: String,
    pub body: Vec<u8>,
}

impl Responder for GeneratedDocument {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        HttpResponse::Ok()
            .content_type(DOCX_CONTENT_TYPE)
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", self.file_name),
            ))
            .body(self.body)
    }
}

/// Actix handler for `POST /api/generate`.
pub async fn process(
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<GeneratedDocument, GenerateError> {
    let form = decode(payload, &config).await?;
    generate(form).await
}

/// Runs the generation pipeline over an already decoded form.
pub async fn generate(mut form: DecodedForm) -> Result<GeneratedDocument, GenerateError> {
    let template = form
        .take_file(TEMPLATE_FIELD)
        .ok_or(GenerateError::MissingTemplate)?;
    let data = parse_data(form.field(DATA_FIELD))?;
    let file_name = output_file_name(form.field(OUTPUT_FILE_NAME_FIELD));

    log::debug!(
        "rendering template {:?} with outputFileName {:?}",
        template.original_name(),
        file_name
    );
    let bytes = tokio::fs::read(template.path())
        .await
        .map_err(GenerateError::UnreadableUpload)?;
    let body = render_document(&bytes, data)?;

    log::info!(
        "generated {file_name} ({} bytes) from a {} byte template",
        body.len(),
        template.size()
    );
    Ok(GeneratedDocument { file_name, body })
}

/// Options the endpoint always renders with.
pub fn template_options() -> TemplateOptions {
    TemplateOptions {
        delimiters: Delimiters::new("[[", "]]"),
        paragraph_loop: true,
        linebreaks: true,
        resolver: Box::new(KeyLookup),
        null_getter: Box::new(PreserveTag),
    }
}

fn render_document(bytes: &[u8], data: Value) -> Result<Vec<u8>, GenerateError> {
    let container = Container::open(bytes).map_err(GenerateError::InvalidContainer)?;
    let mut template =
        DocxTemplate::new(container, template_options()).map_err(GenerateError::InvalidTemplate)?;
    template
        .render(&normalize(data))
        .map_err(GenerateError::Render)?;
    template
        .into_container()
        .to_bytes()
        .map_err(GenerateError::Serialize)
}

fn parse_data(raw: Option<&str>) -> Result<Value, GenerateError> {
    match raw {
        Some(text) if !text.is_empty() => {
            serde_json::from_str(text).map_err(GenerateError::InvalidJson)
        }
        _ => Ok(Value::Object(Default::default())),
    }
}

/// `<name>.docx`, with every character outside visible ASCII, and `"` or `\`,
/// replaced by `_`.
fn output_file_name(requested: Option<&str>) -> String {
    let name = match requested {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_OUTPUT_NAME,
    };
    format!("{}.docx", UNSAFE_FILE_NAME_CHARS.replace_all(name, "_"))
}
