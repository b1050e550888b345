//! CSS formatting and syntax checking.
//!
//! Both operations share one forgiving parser that always produces a node
//! tree, recording problems as it goes. The formatter prints the tree, the
//! checker reports the problems.

use crate::adapters::text::collapse_whitespace;
use crate::domain::model::{Diagnostic, FormatOptions, Location, ValidationVerdict};
use crate::utils::error::TransformError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

static PROPERTY_NAME: OnceLock<Regex> = OnceLock::new();

fn property_name() -> &'static Regex {
    PROPERTY_NAME
        .get_or_init(|| Regex::new(r"^(--[A-Za-z0-9_-]+|-?[A-Za-z_][A-Za-z0-9_-]*)$").unwrap())
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Rule {
        prelude: String,
        children: Vec<Node>,
    },
    Declaration {
        property: String,
        value: String,
        at: usize,
    },
    /// At-rule without a block, or text that could not be read as a
    /// declaration. Printed followed by `;`.
    Statement(String),
    Comment(String),
}

struct Stylesheet {
    nodes: Vec<Node>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

/// Text collected since the last declaration boundary.
#[derive(Default)]
struct Pending {
    text: String,
    start: Option<usize>,
    parens: usize,
}

impl Pending {
    fn push(&mut self, ch: char, at: usize) {
        if !ch.is_whitespace() {
            self.start.get_or_insert(at);
        }
        self.text.push(ch);
    }

    fn take(&mut self) -> (String, Option<usize>) {
        let taken = (self.text.trim().to_string(), self.start);
        *self = Pending::default();
        taken
    }
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn location(&self, offset: usize) -> Location {
        Location::from_offset(self.text, offset)
    }

    fn error(&mut self, message: impl Into<String>, offset: usize) {
        let location = self.location(offset);
        self.errors.push(Diagnostic::at(message, location));
    }

    fn warn(&mut self, message: impl Into<String>, offset: usize) {
        let location = self.location(offset);
        self.warnings.push(Diagnostic::at(message, location));
    }

    fn parse(mut self) -> Stylesheet {
        let nodes = self.parse_block(None);
        Stylesheet {
            nodes,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Parses until the `}` closing the block opened at `opened_at`, or to the
    /// end of input for the top level.
    fn parse_block(&mut self, opened_at: Option<usize>) -> Vec<Node> {
        let in_block = opened_at.is_some();
        let mut nodes = Vec::new();
        let mut pending = Pending::default();

        loop {
            let at = self.pos;
            let Some(ch) = self.peek() else {
                if let Some(open) = opened_at {
                    self.error("Unclosed block: missing '}'", open);
                }
                self.flush(&mut nodes, &mut pending, in_block);
                break;
            };

            if self.text[at..].starts_with("/*") {
                let comment = self.read_comment();
                if pending.text.trim().is_empty() {
                    nodes.push(Node::Comment(comment));
                } else {
                    pending.text.push_str(&comment);
                }
                continue;
            }

            match ch {
                '"' | '\'' => {
                    pending.start.get_or_insert(at);
                    let literal = self.read_string(ch);
                    pending.text.push_str(&literal);
                }
                '(' => {
                    pending.parens += 1;
                    pending.push(ch, at);
                    self.bump();
                }
                ')' => {
                    pending.parens = pending.parens.saturating_sub(1);
                    pending.push(ch, at);
                    self.bump();
                }
                ';' if pending.parens == 0 => {
                    self.bump();
                    self.flush(&mut nodes, &mut pending, in_block);
                }
                '{' => {
                    self.bump();
                    let (raw, start) = pending.take();
                    let prelude = collapse_whitespace(&raw, true);
                    if prelude.is_empty() {
                        self.error("Rule without a selector", at);
                    }
                    let children = self.parse_block(Some(at));
                    self.check_rule(&prelude, &children, start.unwrap_or(at));
                    nodes.push(Node::Rule { prelude, children });
                }
                '}' => {
                    self.bump();
                    if in_block {
                        self.flush(&mut nodes, &mut pending, in_block);
                        break;
                    }
                    self.error("Unexpected '}'", at);
                }
                _ => {
                    pending.push(ch, at);
                    self.bump();
                }
            }
        }

        nodes
    }

    fn flush(&mut self, nodes: &mut Vec<Node>, pending: &mut Pending, in_block: bool) {
        let (raw, start) = pending.take();
        if raw.is_empty() {
            return;
        }
        let at = start.unwrap_or(self.pos);

        if raw.starts_with('@') {
            nodes.push(Node::Statement(collapse_whitespace(&raw, true)));
        } else if !in_block {
            self.error("Unexpected text outside of a rule", at);
            nodes.push(Node::Statement(collapse_whitespace(&raw, true)));
        } else {
            let node = self.declaration(&raw, at);
            nodes.push(node);
        }
    }

    fn declaration(&mut self, raw: &str, at: usize) -> Node {
        let Some(colon) = find_colon(raw) else {
            let text = collapse_whitespace(raw, true);
            self.error(format!("Missing ':' in declaration '{text}'"), at);
            return Node::Statement(text);
        };

        let property = collapse_whitespace(&raw[..colon], true);
        let value = collapse_whitespace(&raw[colon + 1..], true);

        if property.is_empty() {
            self.error("Empty property name", at);
        } else if !property_name().is_match(&property) {
            self.error(format!("Invalid property name '{property}'"), at);
        }
        if value.is_empty() {
            self.error(format!("Missing value for property '{property}'"), at);
        }

        Node::Declaration {
            property,
            value,
            at,
        }
    }

    fn check_rule(&mut self, prelude: &str, children: &[Node], start: usize) {
        if children.iter().all(|node| matches!(node, Node::Comment(_))) {
            self.warn(format!("Empty rule set for '{prelude}'"), start);
        }

        let mut seen = HashSet::new();
        for node in children {
            if let Node::Declaration { property, at, .. } = node {
                if !seen.insert(property.to_ascii_lowercase()) {
                    self.warn(
                        format!("Property '{property}' is declared more than once in '{prelude}'"),
                        *at,
                    );
                }
            }
        }
    }

    /// Reads a quoted string. An unterminated string is reported and closed
    /// so the printed stylesheet stays readable.
    fn read_string(&mut self, quote: char) -> String {
        let start = self.pos;
        let mut literal = String::new();
        if let Some(open) = self.bump() {
            literal.push(open);
        }

        while let Some(ch) = self.bump() {
            literal.push(ch);
            if ch == '\\' {
                if let Some(escaped) = self.bump() {
                    literal.push(escaped);
                }
            } else if ch == quote {
                return literal;
            }
        }

        self.error("Unterminated string", start);
        literal.push(quote);
        literal
    }

    fn read_comment(&mut self) -> String {
        let text = self.text;
        let start = self.pos;
        let rest = &text[start..];
        match rest[2..].find("*/") {
            Some(idx) => {
                let end = start + 2 + idx + 2;
                self.pos = end;
                text[start..end].to_string()
            }
            None => {
                self.pos = text.len();
                self.error("Unterminated comment", start);
                format!("{rest}*/")
            }
        }
    }
}

/// Byte index of the first `:` outside quotes.
fn find_colon(raw: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in raw.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if ch == '\\' => escaped = true,
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ':' => return Some(idx),
            None => {}
        }
    }
    None
}

fn print_nodes(nodes: &[Node], depth: usize, indent: &str, lines: &mut Vec<String>) {
    let pad = indent.repeat(depth);
    for (idx, node) in nodes.iter().enumerate() {
        if depth == 0 && idx > 0 {
            let previous_is_rule = matches!(nodes[idx - 1], Node::Rule { .. });
            if previous_is_rule || matches!(node, Node::Rule { .. }) {
                lines.push(String::new());
            }
        }

        match node {
            Node::Rule { prelude, children } if children.is_empty() => {
                lines.push(format!("{pad}{prelude} {{}}"));
            }
            Node::Rule { prelude, children } => {
                lines.push(format!("{pad}{prelude} {{"));
                print_nodes(children, depth + 1, indent, lines);
                lines.push(format!("{pad}}}"));
            }
            Node::Declaration {
                property, value, ..
            } => lines.push(format!("{pad}{property}: {value};")),
            Node::Statement(text) => lines.push(format!("{pad}{text};")),
            Node::Comment(text) => lines.push(format!("{pad}{text}")),
        }
    }
}

/// Prints one declaration per line with a blank line between top-level
/// rules. Rule and declaration order is kept as written.
pub fn format(text: &str, options: &FormatOptions) -> Result<String, TransformError> {
    let stylesheet = Parser::new(text).parse();
    let mut lines = Vec::new();
    print_nodes(&stylesheet.nodes, 0, &options.indent_unit(), &mut lines);
    Ok(lines.join("\n"))
}

/// Valid iff the checker found no errors; warnings never affect validity.
pub fn validate(text: &str) -> Result<ValidationVerdict, TransformError> {
    if text.trim().is_empty() {
        return Ok(ValidationVerdict::invalid(Diagnostic::new(
            "Stylesheet is empty",
        )));
    }

    let stylesheet = Parser::new(text).parse();
    tracing::debug!(
        "CSS check found {} errors and {} warnings",
        stylesheet.errors.len(),
        stylesheet.warnings.len()
    );
    Ok(ValidationVerdict::from_diagnostics(
        stylesheet.errors,
        stylesheet.warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.message.as_str()).collect()
    }

    #[test]
    fn test_format_one_declaration_per_line() {
        let formatted = format(
            "a{color:red;background : blue}b{}",
            &FormatOptions::default(),
        )
        .unwrap();
        assert_eq!(
            formatted,
            "a {\n    color: red;\n    background: blue;\n}\n\nb {}"
        );
    }

    #[test]
    fn test_format_nested_at_rules_and_statements() {
        let css = "@import url(\"x.css\");@media (max-width: 600px){.a, .b{margin:0 auto !important}}";
        let formatted = format(css, &FormatOptions::with_indent(2)).unwrap();
        assert_eq!(
            formatted,
            "@import url(\"x.css\");\n\n@media (max-width: 600px) {\n  .a, .b {\n    margin: 0 auto !important;\n  }\n}"
        );
    }

    #[test]
    fn test_format_keeps_strings_and_data_urls() {
        let css = "p { content: \"a ;  b\"; background: url(data:image/png;base64,AAA=) }";
        let formatted = format(css, &FormatOptions::default()).unwrap();
        assert_eq!(
            formatted,
            "p {\n    content: \"a ;  b\";\n    background: url(data:image/png;base64,AAA=);\n}"
        );
    }

    #[test]
    fn test_format_is_idempotent() {
        let options = FormatOptions::default();
        let samples = [
            "/* head */ a { color : red ; } /* tail */",
            "@media print { a { } b { x: 1 } }",
            "a { color red; : blue; top: ; }",
            "} a { content: \"open",
            "a { /* unfinished",
            "stray text; a { b: c }",
        ];
        for sample in samples {
            let once = format(sample, &options).unwrap();
            assert_eq!(format(&once, &options).unwrap(), once, "sample: {sample}");
        }
    }

    #[test]
    fn test_validate_clean_stylesheet() {
        let verdict = validate("body { margin: 0; }\n.x:hover { color: #fff }").unwrap();
        assert!(verdict.valid);
        assert!(verdict.errors.is_empty());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn test_validate_reports_errors_with_location() {
        let verdict = validate("a {\n  color red;\n}").unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.errors.len(), 1);
        assert!(verdict.errors[0].message.starts_with("Missing ':'"));
        assert_eq!(verdict.errors[0].location, Some(Location::new(2, 3)));
    }

    #[test]
    fn test_validate_structural_errors() {
        let verdict = validate("a { color: red;").unwrap();
        assert_eq!(messages(&verdict.errors), ["Unclosed block: missing '}'"]);

        let verdict = validate("a { b: c } }").unwrap();
        assert_eq!(messages(&verdict.errors), ["Unexpected '}'"]);

        let verdict = validate("a { content: \"x; }").unwrap();
        assert!(messages(&verdict.errors).contains(&"Unterminated string"));
    }

    #[test]
    fn test_validate_warnings_do_not_invalidate() {
        let verdict = validate("a { color: red; COLOR: blue; }\nb { }").unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.warnings.len(), 2);
        assert!(verdict.warnings[0].message.contains("declared more than once"));
        assert!(verdict.warnings[1].message.starts_with("Empty rule set"));
    }

    #[test]
    fn test_validate_property_checks() {
        let verdict = validate("a { : red; top: ; 1x: 2; --main-color: #000 }").unwrap();
        assert_eq!(
            messages(&verdict.errors),
            [
                "Empty property name",
                "Missing value for property 'top'",
                "Invalid property name '1x'"
            ]
        );
    }

    #[test]
    fn test_validate_empty_stylesheet() {
        let verdict = validate("  \n").unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.errors[0].message, "Stylesheet is empty");
    }
}
