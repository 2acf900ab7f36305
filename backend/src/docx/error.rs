use thiserror::Error;

/// Failures opening or writing the zip container of a document.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("archive contains no entries")]
    Empty,
}

/// A single malformed tag found while compiling a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    UnclosedTag { part: String, tag: String },
    UnopenedTag { part: String, context: String },
    UnopenedSection { part: String, name: String },
    UnclosedSection { part: String, name: String },
    ClosingTagMismatch { part: String, open: String, close: String },
    UnbalancedSection { part: String, name: String },
}

impl std::fmt::Display for TagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagError::UnclosedTag { part, tag } => {
                write!(f, "Unclosed tag \"{tag}\" in {part}")
            }
            TagError::UnopenedTag { part, context } => {
                write!(f, "Unopened tag near \"{context}\" in {part}")
            }
            TagError::UnopenedSection { part, name } => {
                write!(f, "Unopened loop \"{name}\" in {part}")
            }
            TagError::UnclosedSection { part, name } => {
                write!(f, "Unclosed loop \"{name}\" in {part}")
            }
            TagError::ClosingTagMismatch { part, open, close } => write!(
                f,
                "Closing tag \"{close}\" does not match opening tag \"{open}\" in {part}"
            ),
            TagError::UnbalancedSection { part, name } => write!(
                f,
                "Loop \"{name}\" opens and closes at different levels of the document in {part}"
            ),
        }
    }
}

/// Failures compiling or rendering a document template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("The filetype for this file could not be identified, is this file corrupted?")]
    UnidentifiedFileType,

    #[error("Part {part} is not valid UTF-8")]
    NotUtf8 { part: String },

    #[error("Part {part} is not well-formed XML: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Part {part} contains an invalid character reference: {message}")]
    Escape { part: String, message: String },

    #[error("{}", join_tag_errors(.0))]
    Tags(Vec<TagError>),

    #[error("Rendered part {part} is not well-formed XML: {message}")]
    Render { part: String, message: String },
}

fn join_tag_errors(errors: &[TagError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
