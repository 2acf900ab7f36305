use super::compile::Node;
use super::lexer::TEXT_OPEN;
use super::options::TemplateOptions;
use quick_xml::escape::escape;
use serde_json::Value;

pub(crate) struct Renderer<'o> {
    options: &'o TemplateOptions,
}

impl<'o> Renderer<'o> {
    pub(crate) fn new(options: &'o TemplateOptions) -> Self {
        Self { options }
    }

    pub(crate) fn render(&self, nodes: &[Node], data: &Value) -> String {
        let mut out = String::new();
        let mut scopes = vec![data];
        self.render_nodes(nodes, &mut scopes, &mut out);
        out
    }

    fn render_nodes<'d>(&self, nodes: &[Node], scopes: &mut Vec<&'d Value>, out: &mut String) {
        for node in nodes {
            match node {
                Node::Xml(raw) => out.push_str(raw),
                Node::Literal(text) => out.push_str(&escape(text.as_str())),
                Node::Placeholder(name) => match self.lookup(name, scopes) {
                    Some(value) if !value.is_null() => self.write_text(&value_text(value), out),
                    _ => {
                        let text = self
                            .options
                            .null_getter
                            .replacement(name, &self.options.delimiters);
                        self.write_text(&text, out);
                    }
                },
                Node::Section {
                    name,
                    inverted,
                    body,
                } => {
                    let value = self.lookup(name, scopes);
                    if *inverted {
                        if !value.is_some_and(truthy) {
                            self.render_nodes(body, scopes, out);
                        }
                        continue;
                    }
                    match value {
                        Some(Value::Array(items)) => {
                            for item in items {
                                scopes.push(item);
                                self.render_nodes(body, scopes, out);
                                scopes.pop();
                            }
                        }
                        Some(object) if object.is_object() => {
                            scopes.push(object);
                            self.render_nodes(body, scopes, out);
                            scopes.pop();
                        }
                        Some(value) if truthy(value) => self.render_nodes(body, scopes, out),
                        _ => {}
                    }
                }
            }
        }
    }

    /// Resolves `name` against the innermost scope first.
    fn lookup<'d>(&self, name: &str, scopes: &[&'d Value]) -> Option<&'d Value> {
        scopes
            .iter()
            .rev()
            .copied()
            .find_map(|scope| self.options.resolver.resolve(name, scope))
    }

    fn write_text(&self, text: &str, out: &mut String) {
        if !self.options.linebreaks {
            out.push_str(&escape(text));
            return;
        }
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                out.push_str("</w:t><w:br/>");
                out.push_str(TEXT_OPEN);
            }
            out.push_str(&escape(line.strip_suffix('\r').unwrap_or(line)));
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::compile::Compiler;
    use crate::docx::lexer::lex;
    use serde_json::json;

    fn render_with(xml: &str, data: Value, options: TemplateOptions) -> String {
        let chunks = lex("word/document.xml", xml).unwrap();
        let nodes = Compiler::new("word/document.xml", &options.delimiters, options.paragraph_loop)
            .compile(chunks)
            .unwrap();
        Renderer::new(&options).render(&nodes, &data)
    }

    fn render(xml: &str, data: Value) -> String {
        render_with(
            xml,
            data,
            TemplateOptions {
                paragraph_loop: true,
                linebreaks: true,
                ..TemplateOptions::default()
            },
        )
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    #[test]
    fn substitutes_and_escapes_values() {
        let out = render(&para("Hi [[name]]!"), json!({ "name": "Ada & <Co>" }));
        assert_eq!(
            out,
            r#"<w:p><w:r><w:t xml:space="preserve">Hi Ada &amp; &lt;Co&gt;!</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn missing_values_keep_the_tag() {
        let out = render(&para("[[missing]]"), json!({}));
        assert!(out.contains(">[[missing]]<"));
    }

    #[test]
    fn scalars_render_as_json_text() {
        let out = render(&para("[[n]]/[[f]]/[[b]]"), json!({ "n": 42, "f": 1.5, "b": false }));
        assert!(out.contains(">42/1.5/false<"));
    }

    #[test]
    fn line_breaks_become_break_elements() {
        let out = render(&para("[[address]]"), json!({ "address": "1 Main St\r\nSpringfield" }));
        assert!(out.contains(
            r#"1 Main St</w:t><w:br/><w:t xml:space="preserve">Springfield"#
        ));
    }

    #[test]
    fn line_breaks_are_literal_when_disabled() {
        let out = render_with(
            &para("[[address]]"),
            json!({ "address": "a\nb" }),
            TemplateOptions::default(),
        );
        assert!(out.contains(">a\nb<"));
    }

    #[test]
    fn paragraph_loop_repeats_paragraphs_with_item_scope() {
        let xml = format!(
            "<w:body>{}{}{}</w:body>",
            para("[[#people]]"),
            para("[[name]] of [[city]]"),
            para("[[/people]]")
        );
        let out = render(
            &xml,
            json!({ "city": "Paris", "people": [{ "name": "Ada" }, { "name": "Alan", "city": "Rome" }] }),
        );
        assert_eq!(
            out,
            format!(
                "<w:body>{}{}</w:body>",
                r#"<w:p><w:r><w:t xml:space="preserve">Ada of Paris</w:t></w:r></w:p>"#,
                r#"<w:p><w:r><w:t xml:space="preserve">Alan of Rome</w:t></w:r></w:p>"#
            )
        );
    }

    #[test]
    fn empty_or_false_sections_render_nothing() {
        let xml = para("a[[#items]]x[[/items]]b[[#flag]]y[[/flag]]c");
        let out = render(&xml, json!({ "items": [], "flag": false }));
        assert!(out.contains(">abc<"));
    }

    #[test]
    fn inverted_sections_render_for_missing_and_empty() {
        let xml = para("[[^items]]none[[/items]]|[[^other]]none[[/other]]|[[^set]]hidden[[/set]]");
        let out = render(&xml, json!({ "items": [], "set": "yes" }));
        assert!(out.contains(">none|none|<"));
    }

    #[test]
    fn object_sections_push_a_scope() {
        let xml = para("[[#owner]][[name]][[/owner]]");
        let out = render(&xml, json!({ "owner": { "name": "Grace" } }));
        assert!(out.contains(">Grace<"));
    }
}
