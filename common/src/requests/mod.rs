//! Multipart field names accepted by `POST /api/generate`.

/// The `.docx` template file part. Required.
pub const TEMPLATE_FIELD: &str = "template";

/// JSON text mapping placeholder names to values. Optional.
pub const DATA_FIELD: &str = "data";

/// Base name of the generated file, without extension. Optional.
pub const OUTPUT_FILE_NAME_FIELD: &str = "outputFileName";

/// Name used for the generated file when no `outputFileName` is sent.
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// MIME type of the generated document.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
