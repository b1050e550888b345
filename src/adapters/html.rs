//! HTML validation and re-indentation.
//!
//! Validation parses the document with `html5ever` into an `RcDom` and looks
//! for at least one element the author actually wrote. The parser always
//! synthesizes `html`, `head` and `body`, so those only count when their start
//! tag appears in the source.
//!
//! Formatting works on a light tag tokenizer instead of the DOM so the output
//! keeps the author's tags and attributes exactly as written.

use crate::adapters::text::{collapse_text, collapse_whitespace};
use crate::domain::model::{Diagnostic, FormatOptions, ValidationVerdict};
use crate::utils::error::TransformError;
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashSet;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Wrappers the parser inserts on its own.
const IMPLIED_ELEMENTS: &[&str] = &["html", "head", "body"];

/// Elements whose content is reproduced verbatim.
const RAW_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

const INVALID_MESSAGE: &str = "Invalid HTML format. Please check the syntax and try again.";

pub fn validate(text: &str) -> Result<ValidationVerdict, TransformError> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(text);
    let written: HashSet<String> = tokenize(text)
        .into_iter()
        .filter_map(|token| match token {
            Token::StartTag { name, .. } => Some(name),
            _ => None,
        })
        .collect();

    if has_authored_element(&dom.document, &written) {
        Ok(ValidationVerdict::valid())
    } else {
        Ok(ValidationVerdict::invalid(Diagnostic::new(format!(
            "{INVALID_MESSAGE} The document contains no elements."
        ))))
    }
}

fn has_authored_element(handle: &Handle, written: &HashSet<String>) -> bool {
    handle.children.borrow().iter().any(|child| {
        if let NodeData::Element { name, .. } = &child.data {
            let local: &str = &name.local;
            let implied = IMPLIED_ELEMENTS.contains(&local) && !written.contains(local);
            if !implied {
                return true;
            }
        }
        has_authored_element(child, written)
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    /// `<!DOCTYPE ...>`, `<?...?>` and other declarations.
    Declaration(&'a str),
    Comment(&'a str),
    StartTag {
        name: String,
        raw: &'a str,
        self_closing: bool,
    },
    EndTag {
        name: String,
        raw: &'a str,
    },
    Text(&'a str),
    /// Verbatim content of a raw element.
    Raw(&'a str),
}

fn tag_name(raw: &str) -> String {
    raw.trim_start_matches(['<', '/'])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Finds the `>` closing a tag that starts at `start`, skipping quoted
/// attribute values.
fn tag_end(text: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, &b) in text.as_bytes()[start..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(start + offset + 1),
            None => {}
        }
    }
    None
}

fn starts_tag(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'<' {
        return false;
    }
    match bytes[1] {
        b'!' | b'?' => true,
        b'/' => bytes.get(2).is_some_and(u8::is_ascii_alphabetic),
        c => c.is_ascii_alphabetic(),
    }
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];

        if !starts_tag(rest) {
            // text runs until the next tag opener
            let mut end = pos + rest.chars().next().map_or(1, char::len_utf8);
            while end < text.len() && !starts_tag(&text[end..]) {
                end += text[end..].chars().next().map_or(1, char::len_utf8);
            }
            tokens.push(Token::Text(&text[pos..end]));
            pos = end;
            continue;
        }

        if rest.starts_with("<!--") {
            let end = rest[4..]
                .find("-->")
                .map(|idx| pos + 4 + idx + 3)
                .unwrap_or(text.len());
            tokens.push(Token::Comment(&text[pos..end]));
            pos = end;
            continue;
        }

        let Some(end) = tag_end(text, pos) else {
            tokens.push(Token::Text(rest));
            break;
        };
        let raw = &text[pos..end];
        pos = end;

        if raw.starts_with("<!") || raw.starts_with("<?") {
            tokens.push(Token::Declaration(raw));
        } else if raw.starts_with("</") {
            tokens.push(Token::EndTag {
                name: tag_name(raw),
                raw,
            });
        } else {
            let name = tag_name(raw);
            let self_closing = raw.ends_with("/>");
            let is_raw = !self_closing && RAW_ELEMENTS.contains(&name.as_str());
            tokens.push(Token::StartTag {
                name: name.clone(),
                raw,
                self_closing,
            });

            if is_raw {
                let closing = format!("</{name}");
                match text[pos..].to_ascii_lowercase().find(&closing) {
                    Some(idx) => {
                        tokens.push(Token::Raw(&text[pos..pos + idx]));
                        pos += idx;
                    }
                    None => {
                        // unterminated: the rest goes on its own line
                        let content = text[pos..].trim_start();
                        if !content.is_empty() {
                            tokens.push(Token::Raw(content));
                        }
                        pos = text.len();
                    }
                }
            }
        }
    }

    tokens
}

fn normalize_tag(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw, false);
    match collapsed.strip_suffix(" >") {
        Some(stripped) => format!("{stripped}>"),
        None => collapsed,
    }
}

/// Re-indents markup: one tag per line, elements that only hold text stay on
/// one line, void elements do not open a level and raw elements keep their
/// content untouched.
pub fn format(text: &str, options: &FormatOptions) -> Result<String, TransformError> {
    let indent = options.indent_unit();
    let tokens = tokenize(text);
    let mut lines: Vec<String> = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut idx = 0;

    let push = |lines: &mut Vec<String>, depth: usize, line: &str| {
        lines.push(format!("{}{}", indent.repeat(depth), line));
    };

    while idx < tokens.len() {
        match &tokens[idx] {
            Token::Declaration(raw) => push(&mut lines, open.len(), &collapse_whitespace(raw, false)),
            Token::Comment(raw) => push(&mut lines, open.len(), raw.trim()),
            Token::Text(content) => {
                let collapsed = collapse_text(content);
                if !collapsed.is_empty() {
                    push(&mut lines, open.len(), &collapsed);
                }
            }
            Token::Raw(content) => push(&mut lines, open.len(), content),
            Token::StartTag {
                name,
                raw,
                self_closing,
            } => {
                let tag = normalize_tag(raw);
                if *self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
                    push(&mut lines, open.len(), &tag);
                } else if let Some((inline, consumed)) = inline_element(&tokens[idx..], name, &tag)
                {
                    push(&mut lines, open.len(), &inline);
                    idx += consumed;
                    continue;
                } else {
                    push(&mut lines, open.len(), &tag);
                    open.push(name.clone());
                }
            }
            Token::EndTag { name, raw } => {
                if let Some(pos) = open.iter().rposition(|n| n == name) {
                    open.truncate(pos);
                }
                push(&mut lines, open.len(), &normalize_tag(raw));
            }
        }
        idx += 1;
    }

    Ok(lines.join("\n"))
}

/// Renders `<tag>text</tag>` (or a raw element) on one line when the start tag
/// is directly followed by optional text/raw content and its own end tag.
/// Returns the line and the number of tokens consumed.
fn inline_element(tokens: &[Token<'_>], name: &str, tag: &str) -> Option<(String, usize)> {
    let (content, next) = match tokens.get(1) {
        Some(Token::Raw(raw)) => (raw.to_string(), 2),
        Some(Token::Text(text)) if !RAW_ELEMENTS.contains(&name) => (collapse_text(text), 2),
        _ => (String::new(), 1),
    };
    match tokens.get(next) {
        Some(Token::EndTag { name: end, raw }) if end == name => {
            Some((format!("{tag}{content}{}", normalize_tag(raw)), next + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_an_element() {
        assert!(!validate("plain text, no tags").unwrap().valid);
        assert!(validate("<p>hi</p>").unwrap().valid);
        assert!(validate("<!DOCTYPE html><html><head><title>t</title></head></html>")
            .unwrap()
            .valid);
        assert!(!validate("").unwrap().valid);
    }

    #[test]
    fn test_validate_counts_wrappers_written_in_source() {
        assert!(validate("<body class=\"x\">text</body>").unwrap().valid);
        assert!(validate("<html><body>text</body></html>").unwrap().valid);
        assert!(validate("<!DOCTYPE html><html><body>Hello world</body></html>")
            .unwrap()
            .valid);
        assert!(validate("<html><head></head><body></body></html>").unwrap().valid);
        assert!(!validate("<!DOCTYPE html>Hello world").unwrap().valid);
        assert!(!validate("a < b and c > d").unwrap().valid);
    }

    #[test]
    fn test_invalid_verdict_has_message() {
        let verdict = validate("just words").unwrap();
        assert!(verdict.errors[0].message.starts_with("Invalid HTML format"));
    }

    #[test]
    fn test_format_indents_nested_tags() {
        let html = "<div class=\"a\"><ul><li>One</li><li>Two</li></ul><br><p>Hi   there</p></div>";
        let formatted = format(html, &FormatOptions::default()).unwrap();
        assert_eq!(
            formatted,
            "<div class=\"a\">\n    <ul>\n        <li>One</li>\n        <li>Two</li>\n    </ul>\n    <br>\n    <p>Hi there</p>\n</div>"
        );
    }

    #[test]
    fn test_format_keeps_raw_content() {
        let html = "<body><script>if (a < b) {\n  go();\n}</script></body>";
        let formatted = format(html, &FormatOptions::with_indent(2)).unwrap();
        assert_eq!(
            formatted,
            "<body>\n  <script>if (a < b) {\n  go();\n}</script>\n</body>"
        );
    }

    #[test]
    fn test_format_preserves_attributes() {
        let formatted =
            format("<a  href=\"x  y\"\n   title='t'  >link</a>", &FormatOptions::default()).unwrap();
        assert_eq!(formatted, "<a href=\"x  y\" title='t'>link</a>");
    }

    #[test]
    fn test_format_comments_and_doctype() {
        let formatted = format(
            "<!DOCTYPE html>\n<html><!-- note --><body></body></html>",
            &FormatOptions::with_indent(2),
        )
        .unwrap();
        assert_eq!(
            formatted,
            "<!DOCTYPE html>\n<html>\n  <!-- note -->\n  <body></body>\n</html>"
        );
    }

    #[test]
    fn test_format_is_idempotent() {
        let options = FormatOptions::default();
        let samples = [
            "<div><p>Hello <b>world</b>!</p><img src=a.png><pre>  keep\n  me </pre></div>",
            "<ul><li>open<li>items</ul><span>stray</em>",
            "text before <i>x</i> and a < b",
            "<div class=\"x",
            "<div><script>var a",
            "<style>\n  a { b: c }\n<p>after",
            "<textarea>",
        ];
        for sample in samples {
            let once = format(sample, &options).unwrap();
            assert_eq!(format(&once, &options).unwrap(), once, "sample: {sample}");
        }
    }
}
