//! Template configuration and the pluggable lookup strategies.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Delimiters {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("[[", "]]")
    }
}

/// Maps a tag name to a value inside one data scope.
///
/// Returning `None` means the scope has no value for the tag; the renderer
/// then tries the enclosing scopes before falling back to the null getter.
pub trait Resolver: Send + Sync {
    fn resolve<'a>(&self, tag: &str, scope: &'a Value) -> Option<&'a Value>;
}

/// Verbatim key lookup: the whole tag, spaces included, is the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyLookup;

impl Resolver for KeyLookup {
    fn resolve<'a>(&self, tag: &str, scope: &'a Value) -> Option<&'a Value> {
        scope.as_object().and_then(|map| map.get(tag))
    }
}

/// Produces the text written for a placeholder that resolved to nothing.
pub trait NullGetter: Send + Sync {
    fn replacement(&self, tag: &str, delimiters: &Delimiters) -> String;
}

/// Writes the tag back out, delimiters included, so missing data stays
/// visible in the generated document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveTag;

impl NullGetter for PreserveTag {
    fn replacement(&self, tag: &str, delimiters: &Delimiters) -> String {
        format!("{}{}{}", delimiters.start, tag, delimiters.end)
    }
}

pub struct TemplateOptions {
    pub delimiters: Delimiters,
    /// Repeat whole paragraphs when section tags sit alone in their paragraph.
    pub paragraph_loop: bool,
    /// Turn `\n` in values into document line breaks.
    pub linebreaks: bool,
    pub resolver: Box<dyn Resolver>,
    pub null_getter: Box<dyn NullGetter>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            paragraph_loop: false,
            linebreaks: false,
            resolver: Box::new(KeyLookup),
            null_getter: Box::new(PreserveTag),
        }
    }
}

impl std::fmt::Debug for TemplateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateOptions")
            .field("delimiters", &self.delimiters)
            .field("paragraph_loop", &self.paragraph_loop)
            .field("linebreaks", &self.linebreaks)
            .finish_non_exhaustive()
    }
}
