//! Splits a WordprocessingML part into raw markup, paragraph and table row
//! boundaries, and the text content of `<w:t>` runs.
//!
//! Markup is copied byte for byte from the source so everything the template
//! does not touch is written back unchanged. The only rewrite is the opening
//! `<w:t>` tag, which always gains `xml:space="preserve"`.

use super::error::TemplateError;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

const PARAGRAPH: &[u8] = b"w:p";
const ROW: &[u8] = b"w:tr";
const TEXT: &[u8] = b"w:t";

pub(crate) const TEXT_OPEN: &str = r#"<w:t xml:space="preserve">"#;

/// An open element, identified by its position among all start tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub id: usize,
    pub name: String,
}

impl Element {
    pub fn is(&self, name: &[u8]) -> bool {
        self.name.as_bytes() == name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    Paragraph,
    Row,
}

impl Boundary {
    fn of(name: &[u8]) -> Option<Self> {
        match name {
            PARAGRAPH => Some(Boundary::Paragraph),
            ROW => Some(Boundary::Row),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Chunk {
    Xml(String),
    Start {
        boundary: Boundary,
        id: usize,
        raw: String,
        /// The enclosing elements, outermost first.
        path: Vec<Element>,
    },
    End {
        boundary: Boundary,
        id: usize,
        raw: String,
    },
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextNode {
    pub paragraph: Option<usize>,
    pub text: String,
    pub path: Vec<Element>,
}

pub(crate) fn lex(part: &str, xml: &str) -> Result<Vec<Chunk>, TemplateError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut chunks = Vec::new();
    let mut flushed = 0usize;
    let mut stack: Vec<Element> = Vec::new();
    let mut paragraphs: Vec<usize> = Vec::new();
    let mut next_id = 0usize;
    let mut text_start: Option<usize> = None;

    loop {
        let event_start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|source| TemplateError::Xml {
            part: part.to_string(),
            source,
        })?;
        let event_end = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let name = e.name();
                let id = next_id;
                next_id += 1;
                if name.as_ref() == TEXT && text_start.is_none() {
                    push_raw(&mut chunks, &xml[flushed..event_start]);
                    push_raw(&mut chunks, TEXT_OPEN);
                    text_start = Some(event_end);
                    flushed = event_end;
                } else if let Some(boundary) = Boundary::of(name.as_ref()) {
                    push_raw(&mut chunks, &xml[flushed..event_start]);
                    chunks.push(Chunk::Start {
                        boundary,
                        id,
                        raw: xml[event_start..event_end].to_string(),
                        path: stack.clone(),
                    });
                    if boundary == Boundary::Paragraph {
                        paragraphs.push(id);
                    }
                    flushed = event_end;
                }
                stack.push(Element {
                    id,
                    name: String::from_utf8_lossy(name.as_ref()).into_owned(),
                });
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == TEXT {
                    if let Some(start) = text_start.take() {
                        let text = unescape(&xml[start..event_start]).map_err(|err| {
                            TemplateError::Escape {
                                part: part.to_string(),
                                message: err.to_string(),
                            }
                        })?;
                        chunks.push(Chunk::Text(TextNode {
                            paragraph: paragraphs.last().copied(),
                            text: text.into_owned(),
                            path: stack.clone(),
                        }));
                        flushed = event_start;
                    }
                } else if let Some(boundary) = Boundary::of(name.as_ref()) {
                    push_raw(&mut chunks, &xml[flushed..event_start]);
                    if boundary == Boundary::Paragraph {
                        paragraphs.pop();
                    }
                    chunks.push(Chunk::End {
                        boundary,
                        id: stack.last().map_or(0, |element| element.id),
                        raw: xml[event_start..event_end].to_string(),
                    });
                    flushed = event_end;
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    push_raw(&mut chunks, &xml[flushed..]);
    Ok(chunks)
}

/// Appends markup, merging with a preceding raw chunk.
fn push_raw(chunks: &mut Vec<Chunk>, raw: &str) {
    if raw.is_empty() {
        return;
    }
    if let Some(Chunk::Xml(last)) = chunks.last_mut() {
        last.push_str(raw);
    } else {
        chunks.push(Chunk::Xml(raw.to_string()));
    }
}

/// Re-reads rendered markup and checks that it is still well-formed.
pub(crate) fn check_well_formed(part: &str, xml: &str) -> Result<(), TemplateError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(TemplateError::Render {
                    part: part.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }
    if depth > 0 {
        return Err(TemplateError::Render {
            part: part.to_string(),
            message: format!("{depth} element(s) left unclosed"),
        });
    }
    Ok(())
}
