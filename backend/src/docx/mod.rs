//! Placeholder substitution for Word (`.docx`) documents.
//!
//! [`Container`] opens the zip package and writes it back out;
//! [`DocxTemplate`] compiles the WordprocessingML parts of a container and
//! renders JSON data into them.

mod compile;
mod container;
mod error;
mod lexer;
mod options;
mod render;
mod template;

pub use container::Container;
pub use error::{ContainerError, TemplateError};
pub use options::{Delimiters, KeyLookup, PreserveTag, TemplateOptions};
pub use template::DocxTemplate;

#[cfg(test)]
pub(crate) use template::fixtures;
