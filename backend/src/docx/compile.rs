//! Turns lexed chunks into a render tree.
//!
//! Tags split across runs are reassembled per paragraph and moved whole into
//! the run where they start. Section tags are then paired and each section is
//! given the token range it repeats: the runs between its tags, the
//! paragraphs between them for a paragraph loop, or whole table rows when the
//! tags sit in different cells.

use super::error::TagError;
use super::lexer::{Chunk, Element};
use super::options::Delimiters;
use std::collections::{BTreeMap, HashMap};

const TABLE: &[u8] = b"w:tbl";
const ROW: &[u8] = b"w:tr";
const CELL: &[u8] = b"w:tc";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Xml(String),
    Literal(String),
    Placeholder(String),
    Section {
        name: String,
        inverted: bool,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Placeholder,
    Open,
    OpenInverted,
    Close,
}

#[derive(Debug, Clone)]
struct TagToken {
    kind: TagKind,
    name: String,
    raw: String,
    paragraph: Option<usize>,
    alone: bool,
    path: Vec<Element>,
}

#[derive(Debug, Clone)]
enum Token {
    Xml(String),
    Start { id: usize, path: Vec<Element> },
    End { id: usize },
    Literal(String),
    Tag(TagToken),
}

enum Segment {
    Literal(String),
    Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
    Paragraph(usize),
    Detached(usize),
}

struct SectionRange {
    open: usize,
    outer_end: usize,
    inner: (usize, usize),
}

pub(crate) struct Compiler<'a> {
    part: &'a str,
    delimiters: &'a Delimiters,
    paragraph_loop: bool,
    errors: Vec<TagError>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(part: &'a str, delimiters: &'a Delimiters, paragraph_loop: bool) -> Self {
        Self {
            part,
            delimiters,
            paragraph_loop,
            errors: Vec::new(),
        }
    }

    pub(crate) fn compile(mut self, chunks: Vec<Chunk>) -> Result<Vec<Node>, Vec<TagError>> {
        let tokens = self.tokenize(chunks);
        let sections = self.pair_sections(&tokens);
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        Ok(build(&tokens, 0, tokens.len(), &sections))
    }

    /// Reassembles tags per paragraph and flattens chunks into tokens.
    fn tokenize(&mut self, chunks: Vec<Chunk>) -> Vec<Token> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_index: HashMap<Group, usize> = HashMap::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if let Chunk::Text(node) = chunk {
                let key = match node.paragraph {
                    Some(id) => Group::Paragraph(id),
                    None => Group::Detached(index),
                };
                let slot = *group_index.entry(key).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(index);
            }
        }

        let mut segments: HashMap<usize, (Vec<Segment>, bool)> = HashMap::new();
        for members in &groups {
            let texts: Vec<&str> = members
                .iter()
                .map(|&index| match &chunks[index] {
                    Chunk::Text(node) => node.text.as_str(),
                    _ => "",
                })
                .collect();
            let (per_node, alone) = self.split_group(&texts);
            for (&index, node_segments) in members.iter().zip(per_node) {
                segments.insert(index, (node_segments, alone));
            }
        }

        let mut tokens = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            match chunk {
                Chunk::Xml(raw) => tokens.push(Token::Xml(raw)),
                Chunk::Start { id, raw, path, .. } => {
                    tokens.push(Token::Start { id, path });
                    tokens.push(Token::Xml(raw));
                }
                Chunk::End { id, raw, .. } => {
                    tokens.push(Token::Xml(raw));
                    tokens.push(Token::End { id });
                }
                Chunk::Text(node) => {
                    let Some((node_segments, alone)) = segments.remove(&index) else {
                        continue;
                    };
                    for segment in node_segments {
                        match segment {
                            Segment::Literal(text) => tokens.push(Token::Literal(text)),
                            Segment::Tag(raw) => {
                                let (kind, name) = classify(&raw);
                                tokens.push(Token::Tag(TagToken {
                                    kind,
                                    name,
                                    raw,
                                    paragraph: node.paragraph,
                                    alone,
                                    path: node.path.clone(),
                                }));
                            }
                        }
                    }
                }
            }
        }
        tokens
    }

    /// Finds the tags in the joined text of one paragraph and returns the
    /// segments of every run, plus whether the paragraph holds a single tag
    /// and nothing but whitespace besides.
    fn split_group(&mut self, texts: &[&str]) -> (Vec<Vec<Segment>>, bool) {
        let combined: String = texts.concat();
        let (start, end) = (self.delimiters.start.as_str(), self.delimiters.end.as_str());

        let mut tags: Vec<(usize, usize)> = Vec::new();
        let mut open: Option<usize> = None;
        let mut i = 0;
        while i < combined.len() {
            let rest = &combined[i..];
            if rest.starts_with(start) {
                if let Some(o) = open {
                    self.errors.push(TagError::UnclosedTag {
                        part: self.part.to_string(),
                        tag: combined[o..i].to_string(),
                    });
                }
                open = Some(i);
                i += start.len();
            } else if rest.starts_with(end) {
                match open.take() {
                    Some(o) => tags.push((o, i + end.len())),
                    None => self.errors.push(TagError::UnopenedTag {
                        part: self.part.to_string(),
                        context: context_before(&combined, i + end.len()),
                    }),
                }
                i += end.len();
            } else {
                i += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        if let Some(o) = open {
            self.errors.push(TagError::UnclosedTag {
                part: self.part.to_string(),
                tag: combined[o..].to_string(),
            });
        }

        let mut remainder = String::new();
        let mut cursor = 0;
        for &(ts, te) in &tags {
            remainder.push_str(&combined[cursor..ts]);
            cursor = te;
        }
        remainder.push_str(&combined[cursor..]);
        let alone = tags.len() == 1 && remainder.trim().is_empty();

        let mut per_node = Vec::with_capacity(texts.len());
        let mut node_start = 0;
        for text in texts {
            let node_end = node_start + text.len();
            let mut node_segments = Vec::new();
            let mut pos = node_start;
            for &(ts, te) in &tags {
                if ts >= node_end {
                    break;
                }
                if te <= node_start {
                    continue;
                }
                if ts >= node_start {
                    if ts > pos {
                        node_segments.push(Segment::Literal(combined[pos..ts].to_string()));
                    }
                    node_segments.push(Segment::Tag(
                        combined[ts + start.len()..te - end.len()].to_string(),
                    ));
                }
                pos = pos.max(te.min(node_end));
            }
            if pos < node_end {
                node_segments.push(Segment::Literal(combined[pos..node_end].to_string()));
            }
            per_node.push(node_segments);
            node_start = node_end;
        }

        (per_node, alone)
    }

    /// Pairs open and close tags and works out the range each section covers.
    fn pair_sections(&mut self, tokens: &[Token]) -> BTreeMap<usize, SectionRange> {
        let mut bounds: HashMap<usize, (usize, usize)> = HashMap::new();
        for (index, token) in tokens.iter().enumerate() {
            match token {
                Token::Start { id, .. } => {
                    bounds.entry(*id).or_insert((index, index)).0 = index;
                }
                Token::End { id } => {
                    bounds.entry(*id).or_insert((index, index)).1 = index;
                }
                _ => {}
            }
        }

        let mut stack: Vec<usize> = Vec::new();
        let mut sections = BTreeMap::new();
        for (index, token) in tokens.iter().enumerate() {
            let Token::Tag(tag) = token else { continue };
            match tag.kind {
                TagKind::Placeholder => {}
                TagKind::Open | TagKind::OpenInverted => stack.push(index),
                TagKind::Close => {
                    let Some(open_index) = stack.pop() else {
                        self.errors.push(TagError::UnopenedSection {
                            part: self.part.to_string(),
                            name: tag.name.clone(),
                        });
                        continue;
                    };
                    let Token::Tag(open) = &tokens[open_index] else {
                        continue;
                    };
                    if open.name != tag.name {
                        self.errors.push(TagError::ClosingTagMismatch {
                            part: self.part.to_string(),
                            open: open.raw.clone(),
                            close: tag.raw.clone(),
                        });
                        continue;
                    }
                    let Some(range) = self.section_range(tokens, &bounds, open_index, index)
                    else {
                        continue;
                    };
                    if sections.contains_key(&range.open) {
                        self.unbalanced(&tag.name);
                    } else {
                        sections.insert(range.open, range);
                    }
                }
            }
        }

        for open_index in stack {
            if let Token::Tag(open) = &tokens[open_index] {
                self.errors.push(TagError::UnclosedSection {
                    part: self.part.to_string(),
                    name: open.name.clone(),
                });
            }
        }
        sections
    }

    fn section_range(
        &mut self,
        tokens: &[Token],
        bounds: &HashMap<usize, (usize, usize)>,
        open_index: usize,
        close_index: usize,
    ) -> Option<SectionRange> {
        let (Token::Tag(open), Token::Tag(close)) = (&tokens[open_index], &tokens[close_index])
        else {
            return None;
        };

        if self.paragraph_loop && open.alone && close.alone {
            if let (Some(first), Some(last)) = (open.paragraph, close.paragraph) {
                if first != last {
                    let (first_start, first_end) = bounds.get(&first).copied()?;
                    let (last_start, last_end) = bounds.get(&last).copied()?;
                    if parent(tokens, first_start) == parent(tokens, last_start) {
                        return Some(SectionRange {
                            open: first_start,
                            outer_end: last_end,
                            inner: (first_end + 1, last_start),
                        });
                    }
                }
            }
        }

        let shared = open
            .path
            .iter()
            .zip(&close.path)
            .take_while(|(a, b)| a == b)
            .count();
        let (open_rest, close_rest) = (&open.path[shared..], &close.path[shared..]);

        if !crosses_table(open_rest) && !crosses_table(close_rest) {
            let names = |rest: &[Element]| rest.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
            if names(open_rest) != names(close_rest) {
                self.unbalanced(&open.name);
                return None;
            }
            return Some(SectionRange {
                open: open_index,
                outer_end: close_index,
                inner: (open_index + 1, close_index),
            });
        }

        let rows = match shared.checked_sub(1).map(|index| &open.path[index]) {
            Some(ancestor) if ancestor.is(ROW) => Some((ancestor.id, ancestor.id)),
            Some(ancestor) if ancestor.is(TABLE) => match (open_rest.first(), close_rest.first()) {
                (Some(first), Some(last)) if first.is(ROW) && last.is(ROW) => {
                    Some((first.id, last.id))
                }
                _ => None,
            },
            _ => None,
        };
        let Some((first_row, last_row)) = rows else {
            self.unbalanced(&open.name);
            return None;
        };
        let (start, _) = bounds.get(&first_row).copied()?;
        let (_, end) = bounds.get(&last_row).copied()?;
        Some(SectionRange {
            open: start,
            outer_end: end,
            inner: (start + 1, end),
        })
    }

    fn unbalanced(&mut self, name: &str) {
        self.errors.push(TagError::UnbalancedSection {
            part: self.part.to_string(),
            name: name.to_string(),
        });
    }
}

/// The element directly enclosing the boundary that starts at `index`.
fn parent(tokens: &[Token], index: usize) -> Option<&Element> {
    match &tokens[index] {
        Token::Start { path, .. } => path.last(),
        _ => None,
    }
}

/// Whether `rest` leaves a table cell, row or table.
fn crosses_table(rest: &[Element]) -> bool {
    rest.iter()
        .any(|element| element.is(CELL) || element.is(ROW) || element.is(TABLE))
}

fn classify(raw: &str) -> (TagKind, String) {
    let kind = match raw.chars().next() {
        Some('#') => TagKind::Open,
        Some('^') => TagKind::OpenInverted,
        Some('/') => TagKind::Close,
        _ => return (TagKind::Placeholder, raw.to_string()),
    };
    (kind, raw[1..].to_string())
}

/// Up to twenty characters of text ending at `end`.
fn context_before(text: &str, end: usize) -> String {
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(19)
        .map_or(0, |(index, _)| index);
    head[start..].to_string()
}

fn build(
    tokens: &[Token],
    from: usize,
    to: usize,
    sections: &BTreeMap<usize, SectionRange>,
) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut index = from;
    while index < to {
        if let Some(section) = sections.get(&index) {
            if let Some((name, inverted)) = section_tag(tokens, section) {
                nodes.push(Node::Section {
                    name,
                    inverted,
                    body: build(tokens, section.inner.0, section.inner.1, sections),
                });
                index = section.outer_end + 1;
                continue;
            }
        }

        match &tokens[index] {
            Token::Xml(raw) => match nodes.last_mut() {
                Some(Node::Xml(last)) => last.push_str(raw),
                _ => nodes.push(Node::Xml(raw.clone())),
            },
            Token::Literal(text) => nodes.push(Node::Literal(text.clone())),
            Token::Tag(tag) if tag.kind == TagKind::Placeholder => {
                nodes.push(Node::Placeholder(tag.name.clone()))
            }
            _ => {}
        }
        index += 1;
    }
    nodes
}

/// Name and kind of the open tag that starts `section`.
fn section_tag(tokens: &[Token], section: &SectionRange) -> Option<(String, bool)> {
    tokens[section.open..=section.outer_end]
        .iter()
        .find_map(|token| match token {
            Token::Tag(tag) if tag.kind == TagKind::Open => Some((tag.name.clone(), false)),
            Token::Tag(tag) if tag.kind == TagKind::OpenInverted => Some((tag.name.clone(), true)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::lexer::lex;

    fn compile(xml: &str, paragraph_loop: bool) -> Result<Vec<Node>, Vec<TagError>> {
        let delimiters = Delimiters::default();
        let chunks = lex("word/document.xml", xml).unwrap();
        Compiler::new("word/document.xml", &delimiters, paragraph_loop).compile(chunks)
    }

    fn placeholders(nodes: &[Node]) -> Vec<String> {
        let mut names = Vec::new();
        for node in nodes {
            match node {
                Node::Placeholder(name) => names.push(name.clone()),
                Node::Section { body, .. } => names.extend(placeholders(body)),
                _ => {}
            }
        }
        names
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    #[test]
    fn joins_tags_split_across_runs() {
        let xml = "<w:p><w:r><w:t>Dear [[first</w:t></w:r><w:r><w:t> name]], hi</w:t></w:r></w:p>";
        let nodes = compile(xml, true).unwrap();
        assert_eq!(placeholders(&nodes), vec!["first name"]);
        assert!(nodes.contains(&Node::Literal("Dear ".into())));
        assert!(nodes.contains(&Node::Literal(", hi".into())));
    }

    #[test]
    fn delimiter_split_between_runs() {
        let xml = "<w:p><w:r><w:t>[</w:t></w:r><w:r><w:t>[x]</w:t></w:r><w:r><w:t>]</w:t></w:r></w:p>";
        let nodes = compile(xml, true).unwrap();
        assert_eq!(placeholders(&nodes), vec!["x"]);
        assert!(!nodes.iter().any(|node| matches!(node, Node::Literal(_))));
    }

    #[test]
    fn reports_unclosed_and_unopened_tags() {
        let xml = format!("<w:body>{}{}</w:body>", para("[[name"), para("oops]] here"));
        let errors = compile(&xml, true).unwrap_err();
        assert_eq!(
            errors,
            vec![
                TagError::UnclosedTag {
                    part: "word/document.xml".into(),
                    tag: "[[name".into()
                },
                TagError::UnopenedTag {
                    part: "word/document.xml".into(),
                    context: "oops]]".into()
                },
            ]
        );
    }

    #[test]
    fn inline_section_wraps_runs_between_tags() {
        let xml = para("[[#items]][[name]], [[/items]]");
        let nodes = compile(&xml, true).unwrap();
        let section = nodes
            .iter()
            .find(|node| matches!(node, Node::Section { .. }))
            .unwrap();
        match section {
            Node::Section { name, inverted, body } => {
                assert_eq!(name, "items");
                assert!(!inverted);
                assert_eq!(
                    body,
                    &vec![Node::Placeholder("name".into()), Node::Literal(", ".into())]
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn paragraph_loop_spans_whole_paragraphs() {
        let xml = format!(
            "<w:body>{}{}{}</w:body>",
            para("[[#items]]"),
            para("- [[name]]"),
            para(" [[/items]] ")
        );
        let nodes = compile(&xml, true).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Xml("<w:body>".into()));
        assert_eq!(nodes[2], Node::Xml("</w:body>".into()));
        let Node::Section { body, .. } = &nodes[1] else {
            panic!("expected a section");
        };
        let Node::Xml(head) = &body[0] else {
            panic!("expected markup");
        };
        assert!(head.starts_with("<w:p>"));
        assert!(!body
            .iter()
            .any(|node| matches!(node, Node::Xml(raw) if raw.contains("items"))));
    }

    #[test]
    fn without_paragraph_loop_sections_stay_inline() {
        let xml = format!("<w:body>{}{}{}</w:body>", para("[[#a]]"), para("x"), para("[[/a]]"));
        let nodes = compile(&xml, false).unwrap();
        let Node::Xml(head) = &nodes[0] else {
            panic!("expected markup");
        };
        assert!(head.starts_with("<w:body><w:p>"));
    }

    #[test]
    fn reports_section_errors() {
        let xml = format!(
            "<w:body>{}{}{}</w:body>",
            para("[[/stray]]"),
            para("[[#a]] [[/b]]"),
            para("[[^open]]")
        );
        let errors = compile(&xml, true).unwrap_err();
        assert!(matches!(errors[0], TagError::UnopenedSection { ref name, .. } if name == "stray"));
        assert!(matches!(errors[1], TagError::ClosingTagMismatch { ref open, ref close, .. }
            if open == "#a" && close == "/b"));
        assert!(matches!(errors[2], TagError::UnclosedSection { ref name, .. } if name == "open"));
    }

    #[test]
    fn rejects_sections_crossing_table_cells_and_body() {
        let xml = format!(
            "<w:body><w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>{}</w:body>",
            para("[[#rows]] x"),
            para("[[/rows]] y")
        );
        let errors = compile(&xml, true).unwrap_err();
        assert!(matches!(errors[0], TagError::UnbalancedSection { ref name, .. } if name == "rows"));
    }

    fn table(rows: &[&[&str]]) -> String {
        let rows: String = rows
            .iter()
            .map(|cells| {
                let cells: String = cells
                    .iter()
                    .map(|text| format!("<w:tc>{}</w:tc>", para(text)))
                    .collect();
                format!("<w:tr>{cells}</w:tr>")
            })
            .collect();
        format!("<w:tbl>{rows}</w:tbl>")
    }

    #[test]
    fn section_across_cells_repeats_the_row() {
        let xml = format!(
            "<w:body>{}</w:body>",
            table(&[&["[[#rows]][[v]]", "[[w]][[/rows]]"]])
        );
        let nodes = compile(&xml, true).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Xml("<w:body><w:tbl>".into()));
        assert_eq!(nodes[2], Node::Xml("</w:tbl></w:body>".into()));
        let Node::Section { name, body, .. } = &nodes[1] else {
            panic!("expected a section");
        };
        assert_eq!(name, "rows");
        assert!(matches!(body.first(), Some(Node::Xml(raw)) if raw.starts_with("<w:tr>")));
        assert!(matches!(body.last(), Some(Node::Xml(raw)) if raw.ends_with("</w:tr>")));
        assert_eq!(placeholders(body), vec!["v", "w"]);
    }

    #[test]
    fn section_across_rows_repeats_every_row_between() {
        let xml = format!(
            "<w:body>{}</w:body>",
            table(&[&["[[#rows]]"], &["[[v]]"], &["[[/rows]]"]])
        );
        let nodes = compile(&xml, true).unwrap();
        let Node::Section { body, .. } = &nodes[1] else {
            panic!("expected a section");
        };
        let markup: String = body
            .iter()
            .filter_map(|node| match node {
                Node::Xml(raw) => Some(raw.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(markup.matches("<w:tr>").count(), 3);
        assert_eq!(markup.matches("<w:p>").count(), 3);
    }

    #[test]
    fn rejects_sections_spanning_two_tables() {
        let xml = format!(
            "<w:body>{}{}</w:body>",
            table(&[&["[[#a]] x"]]),
            table(&[&["[[/a]] y"]])
        );
        let errors = compile(&xml, true).unwrap_err();
        assert!(matches!(errors[0], TagError::UnbalancedSection { ref name, .. } if name == "a"));
    }

    #[test]
    fn nested_sections_on_the_same_row_are_unbalanced() {
        let xml = format!(
            "<w:body>{}</w:body>",
            table(&[&["[[#a]][[#b]]", "[[/b]][[/a]]"]])
        );
        let errors = compile(&xml, true).unwrap_err();
        assert!(matches!(errors[0], TagError::UnbalancedSection { ref name, .. } if name == "a"));
    }
}
