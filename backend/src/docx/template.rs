//! A `.docx` container compiled for placeholder substitution.

use super::compile::{Compiler, Node};
use super::container::Container;
use super::error::TemplateError;
use super::lexer::{check_well_formed, lex};
use super::options::TemplateOptions;
use super::render::Renderer;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const MAIN_CONTENT_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml",
    "application/vnd.ms-word.document.macroEnabled.main+xml",
    "application/vnd.ms-word.template.macroEnabledTemplate.main+xml",
];

const SECONDARY_CONTENT_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml",
];

#[derive(Debug)]
struct CompiledPart {
    name: String,
    nodes: Vec<Node>,
}

#[derive(Debug)]
pub struct DocxTemplate {
    container: Container,
    options: TemplateOptions,
    parts: Vec<CompiledPart>,
}

impl DocxTemplate {
    /// Compiles every templated part of `container`.
    ///
    /// Tag errors from all parts are collected and reported together.
    pub fn new(container: Container, options: TemplateOptions) -> Result<Self, TemplateError> {
        let names = templated_parts(&container)?;

        let mut parts = Vec::with_capacity(names.len());
        let mut tag_errors = Vec::new();
        for name in names {
            let Some(bytes) = container.part(&name) else {
                continue;
            };
            let xml = std::str::from_utf8(bytes)
                .map_err(|_| TemplateError::NotUtf8 { part: name.clone() })?;
            let chunks = lex(&name, xml)?;
            let compiled =
                Compiler::new(&name, &options.delimiters, options.paragraph_loop).compile(chunks);
            match compiled {
                Ok(nodes) => parts.push(CompiledPart { name, nodes }),
                Err(errors) => tag_errors.extend(errors),
            }
        }

        if !tag_errors.is_empty() {
            return Err(TemplateError::Tags(tag_errors));
        }

        log::debug!(
            "compiled template parts: {:?}",
            parts.iter().map(|part| part.name.as_str()).collect::<Vec<_>>()
        );
        Ok(Self {
            container,
            options,
            parts,
        })
    }

    /// Renders `data` into every templated part of the container.
    pub fn render(&mut self, data: &Value) -> Result<(), TemplateError> {
        let renderer = Renderer::new(&self.options);
        for part in &self.parts {
            let xml = renderer.render(&part.nodes, data);
            check_well_formed(&part.name, &xml)?;
            self.container.set_part(&part.name, xml.into_bytes());
        }
        Ok(())
    }

    pub fn into_container(self) -> Container {
        self.container
    }
}

/// Lists the parts to template, main document first, as declared in
/// `[Content_Types].xml`.
fn templated_parts(container: &Container) -> Result<Vec<String>, TemplateError> {
    let Some(bytes) = container.part(CONTENT_TYPES_PART) else {
        log::debug!(
            "no {CONTENT_TYPES_PART} among parts {:?}",
            container.part_names().collect::<Vec<_>>()
        );
        return Err(TemplateError::UnidentifiedFileType);
    };
    let xml = std::str::from_utf8(bytes).map_err(|_| TemplateError::NotUtf8 {
        part: CONTENT_TYPES_PART.to_string(),
    })?;

    let mut main = None;
    let mut secondary = Vec::new();
    for (part_name, content_type) in overrides(xml)? {
        let name = part_name.trim_start_matches('/').to_string();
        if container.part(&name).is_none() {
            continue;
        }
        if MAIN_CONTENT_TYPES.contains(&content_type.as_str()) {
            main.get_or_insert(name);
        } else if SECONDARY_CONTENT_TYPES.contains(&content_type.as_str()) {
            secondary.push(name);
        }
    }

    let Some(main) = main else {
        log::debug!(
            "no main document among parts {:?}",
            container.part_names().collect::<Vec<_>>()
        );
        return Err(TemplateError::UnidentifiedFileType);
    };
    let mut names = Vec::with_capacity(secondary.len() + 1);
    names.push(main);
    names.extend(secondary);
    Ok(names)
}

/// `(PartName, ContentType)` pairs of every `<Override>` element.
fn overrides(xml: &str) -> Result<Vec<(String, String)>, TemplateError> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();
    loop {
        let event = reader.read_event().map_err(|source| TemplateError::Xml {
            part: CONTENT_TYPES_PART.to_string(),
            source,
        })?;
        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Override" => {
                let mut part_name = None;
                let mut content_type = None;
                for attribute in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attribute.value);
                    let value = unescape(&value)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| value.to_string());
                    match attribute.key.local_name().as_ref() {
                        b"PartName" => part_name = Some(value),
                        b"ContentType" => content_type = Some(value),
                        _ => {}
                    }
                }
                if let (Some(part_name), Some(content_type)) = (part_name, content_type) {
                    found.push((part_name, content_type));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}
