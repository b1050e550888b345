// XML ⇄ StructuredValue conversion, re-indentation and well-formedness checks.
use crate::domain::model::{
    Diagnostic, FormatOptions, Location, StructuredValue, ValidationVerdict,
};
use crate::utils::error::TransformError;
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Key holding an element's attributes.
pub const ATTRIBUTES_KEY: &str = "$";
/// Key holding an element's text when it also has attributes or children.
pub const TEXT_KEY: &str = "_";

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
const ROOT_ELEMENT: &str = "root";
const ITEM_ELEMENT: &str = "item";

/// Parses XML into a tree keyed by the root element name.
///
/// Text-only elements become strings, attributes are grouped under `$`, text
/// next to attributes or children goes under `_`, and repeated child names are
/// collected into a sequence.
pub fn parse(text: &str) -> Result<StructuredValue, TransformError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| parse_error(text, reader.buffer_position(), err))?;
        match event {
            Event::Start(tag) => {
                let element = XmlElement::from_tag(&tag, text, reader.buffer_position())?;
                stack.push(element);
            }
            Event::Empty(tag) => {
                let element = XmlElement::from_tag(&tag, text, reader.buffer_position())?;
                attach(&mut stack, &mut root, element, text, reader.buffer_position())?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element, text, reader.buffer_position())?;
                }
            }
            Event::Text(content) => {
                let unescaped = content
                    .unescape()
                    .map_err(|err| parse_error(text, reader.buffer_position(), err))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&unescaped),
                    None => {
                        return Err(TransformError::parse_at(
                            "Text data outside of root node",
                            Location::from_offset(text, reader.buffer_position()),
                        ))
                    }
                }
            }
            Event::CData(content) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(TransformError::parse_at(
            format!("Unclosed root tag <{}>", open.name),
            Location::from_offset(text, text.len()),
        ));
    }

    let root = root.ok_or_else(|| TransformError::parse("Document has no root element"))?;
    let mut map = IndexMap::with_capacity(1);
    let name = root.name.clone();
    map.insert(name, root.into_value());
    Ok(StructuredValue::Mapping(map))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    text: &str,
    offset: usize,
) -> Result<(), TransformError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(TransformError::parse_at(
            "Document has more than one root element",
            Location::from_offset(text, offset),
        )),
    }
}

fn parse_error(text: &str, offset: usize, err: quick_xml::Error) -> TransformError {
    TransformError::parse_at(
        format!("Invalid XML: {err}"),
        Location::from_offset(text, offset),
    )
}

#[derive(Debug)]
struct XmlElement {
    name: String,
    attributes: IndexMap<String, StructuredValue>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_tag(tag: &BytesStart<'_>, text: &str, offset: usize) -> Result<Self, TransformError> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let mut attributes = IndexMap::new();
        for attr in tag.attributes() {
            let attr = attr.map_err(|err| parse_error(text, offset, err.into()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| parse_error(text, offset, err))?;
            attributes.insert(key, StructuredValue::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn into_value(self) -> StructuredValue {
        if self.attributes.is_empty() && self.children.is_empty() {
            return StructuredValue::String(self.text);
        }

        let mut map = IndexMap::new();
        if !self.attributes.is_empty() {
            map.insert(
                ATTRIBUTES_KEY.to_string(),
                StructuredValue::Mapping(self.attributes),
            );
        }
        if !self.text.is_empty() {
            map.insert(TEXT_KEY.to_string(), StructuredValue::String(self.text));
        }
        for child in self.children {
            let name = child.name.clone();
            let value = child.into_value();
            match map.get_mut(&name) {
                None => {
                    map.insert(name, value);
                }
                Some(StructuredValue::Sequence(items)) => items.push(value),
                Some(existing) => {
                    let first = std::mem::replace(existing, StructuredValue::Null);
                    *existing = StructuredValue::Sequence(vec![first, value]);
                }
            }
        }
        StructuredValue::Mapping(map)
    }
}

/// Builds an XML document from a tree. A single-key mapping names the root
/// element, anything else is wrapped in `<root>`. A top-level sequence
/// becomes repeated `<item>` children of `<root>`.
pub fn print(value: &StructuredValue, options: &FormatOptions) -> Result<String, TransformError> {
    let indent = options.indent_unit();
    let mut out = String::from(DECLARATION);
    out.push('\n');

    match value {
        StructuredValue::Mapping(map) if map.len() == 1 => match map.first() {
            Some((name, child)) if !matches!(child, StructuredValue::Sequence(_)) => {
                write_element(&mut out, name, child, 0, &indent)
            }
            // repeated elements need a single parent
            _ => write_element(&mut out, ROOT_ELEMENT, value, 0, &indent),
        },
        StructuredValue::Sequence(_) => {
            let wrapped = StructuredValue::Mapping(IndexMap::from([(
                ITEM_ELEMENT.to_string(),
                value.clone(),
            )]));
            write_element(&mut out, ROOT_ELEMENT, &wrapped, 0, &indent);
        }
        other => write_element(&mut out, ROOT_ELEMENT, other, 0, &indent),
    }

    while out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn write_element(buf: &mut String, name: &str, value: &StructuredValue, depth: usize, indent: &str) {
    let pad = indent.repeat(depth);
    match value {
        StructuredValue::Sequence(items) => {
            for item in items {
                write_element(buf, name, item, depth, indent);
            }
        }
        StructuredValue::Mapping(map) => {
            let attributes = map
                .get(ATTRIBUTES_KEY)
                .and_then(StructuredValue::as_mapping)
                .map(render_attributes)
                .unwrap_or_default();
            let text = map.get(TEXT_KEY).map(scalar_text).unwrap_or_default();
            let children: Vec<(&String, &StructuredValue)> = map
                .iter()
                .filter(|(key, _)| key.as_str() != ATTRIBUTES_KEY && key.as_str() != TEXT_KEY)
                .collect();

            if children.is_empty() {
                if text.is_empty() {
                    buf.push_str(&format!("{pad}<{name}{attributes}/>\n"));
                } else {
                    buf.push_str(&format!(
                        "{pad}<{name}{attributes}>{}</{name}>\n",
                        escape_text(&text)
                    ));
                }
                return;
            }

            buf.push_str(&format!("{pad}<{name}{attributes}>\n"));
            if !text.is_empty() {
                buf.push_str(&format!("{pad}{indent}{}\n", escape_text(&text)));
            }
            for (key, child) in children {
                write_element(buf, key, child, depth + 1, indent);
            }
            buf.push_str(&format!("{pad}</{name}>\n"));
        }
        StructuredValue::Null => buf.push_str(&format!("{pad}<{name}/>\n")),
        scalar => {
            let text = scalar_text(scalar);
            if text.is_empty() {
                buf.push_str(&format!("{pad}<{name}/>\n"));
            } else {
                buf.push_str(&format!("{pad}<{name}>{}</{name}>\n", escape_text(&text)));
            }
        }
    }
}

fn render_attributes(attributes: &IndexMap<String, StructuredValue>) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{}\"", escape_attribute(&scalar_text(value))))
        .collect()
}

fn scalar_text(value: &StructuredValue) -> String {
    match value {
        StructuredValue::Null => String::new(),
        StructuredValue::Bool(b) => b.to_string(),
        StructuredValue::Number(n) => n.to_string(),
        StructuredValue::String(s) => s.clone(),
        nested => serde_json::to_string(nested).unwrap_or_default(),
    }
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

/// Re-serializes the document with one element per line. Elements holding
/// only text stay on a single line.
pub fn format(text: &str, options: &FormatOptions) -> Result<String, TransformError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', options.indent_size);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => writer
                .write_event(event)
                .map_err(|e| TransformError::internal(format!("XML write failed: {e}")))?,
            Err(err) => return Err(parse_error(text, reader.buffer_position(), err)),
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| TransformError::internal(format!("XML output is not UTF-8: {e}")))
}

/// Well-formedness check. Resource-limit failures of the parser are reported
/// as `InvalidSyntax` rather than as a verdict.
pub fn validate(text: &str) -> Result<ValidationVerdict, TransformError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };

    match roxmltree::Document::parse_with_options(text, options) {
        Ok(_) => Ok(ValidationVerdict::valid()),
        Err(
            err @ (roxmltree::Error::NodesLimitReached | roxmltree::Error::EntityReferenceLoop(_)),
        ) => Err(TransformError::InvalidSyntax {
            message: err.to_string(),
        }),
        Err(err) => {
            let pos = err.pos();
            Ok(ValidationVerdict::invalid(Diagnostic::at(
                err.to_string(),
                Location::new(pos.row as usize, pos.col as usize),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: serde_json::Value) -> StructuredValue {
        StructuredValue::from(json)
    }

    #[test]
    fn test_parse_simple_document() {
        let parsed = parse("<note><to>Tove</to><from>Jani</from></note>").unwrap();
        assert_eq!(parsed, value(json!({"note": {"to": "Tove", "from": "Jani"}})));
    }

    #[test]
    fn test_parse_attributes_and_mixed_content() {
        let parsed = parse(r#"<item id="7" kind="a &amp; b">label<sub/></item>"#).unwrap();
        assert_eq!(
            parsed,
            value(json!({"item": {"$": {"id": "7", "kind": "a & b"}, "_": "label", "sub": ""}}))
        );
    }

    #[test]
    fn test_parse_attribute_only_element() {
        let parsed = parse(r#"<img src="a.png"/>"#).unwrap();
        assert_eq!(parsed, value(json!({"img": {"$": {"src": "a.png"}}})));
    }

    #[test]
    fn test_parse_repeated_children_become_sequence() {
        let parsed = parse("<list><i>1</i><i>2</i><i>3</i></list>").unwrap();
        assert_eq!(parsed, value(json!({"list": {"i": ["1", "2", "3"]}})));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            parse("<a><b></a>"),
            Err(TransformError::ParseError { .. })
        ));
        assert!(parse("<a>").is_err());
        assert!(parse("just text").is_err());
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_print_builds_document() {
        let xml = print(
            &value(json!({"note": {"$": {"lang": "en"}, "to": "Tove", "tags": ["a", "b"]}})),
            &FormatOptions::with_indent(2),
        )
        .unwrap();

        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <note lang=\"en\">\n  <to>Tove</to>\n  <tags>a</tags>\n  <tags>b</tags>\n</note>"
        );
    }

    #[test]
    fn test_print_sequence_roots_get_one_parent() {
        let options = FormatOptions::with_indent(2);

        let xml = print(&value(json!({"item": [1, 2]})), &options).unwrap();
        assert!(xml.ends_with("<root>\n  <item>1</item>\n  <item>2</item>\n</root>"));

        let xml = print(&value(json!([1, {"a": "b"}])), &options).unwrap();
        assert!(xml.ends_with("<root>\n  <item>1</item>\n  <item>\n    <a>b</a>\n  </item>\n</root>"));

        let xml = print(&value(json!([])), &options).unwrap();
        assert!(xml.ends_with("<root/>"));
    }

    #[test]
    fn test_print_wraps_multiple_keys_in_root() {
        let xml = print(&value(json!({"a": 1, "b": "x < y"})), &FormatOptions::with_indent(2)).unwrap();
        assert!(xml.contains("<root>\n  <a>1</a>\n  <b>x &lt; y</b>\n</root>"));
    }

    #[test]
    fn test_print_parse_round_trip() {
        let original = value(json!({"doc": {"$": {"v": "1"}, "title": "T", "p": ["one", "two"]}}));
        let xml = print(&original, &FormatOptions::default()).unwrap();
        assert_eq!(parse(&xml).unwrap(), original);
    }

    #[test]
    fn test_format_indents_and_is_idempotent() {
        let options = FormatOptions::default();
        let once = format("<a><b>text</b><c x=\"1\"/></a>", &options).unwrap();
        assert_eq!(once, "<a>\n    <b>text</b>\n    <c x=\"1\"/>\n</a>");
        assert_eq!(format(&once, &options).unwrap(), once);
    }

    #[test]
    fn test_format_keeps_declaration() {
        let options = FormatOptions::with_indent(2);
        let once = format("<?xml version=\"1.0\"?><r><s/></r>", &options).unwrap();
        assert_eq!(once, "<?xml version=\"1.0\"?>\n<r>\n  <s/>\n</r>");
    }

    #[test]
    fn test_validate_well_formedness() {
        assert!(validate("<a><b/></a>").unwrap().valid);
        assert!(validate("<!DOCTYPE a><a/>").unwrap().valid);

        let verdict = validate("<a><b></a>").unwrap();
        assert!(!verdict.valid);
        assert!(verdict.errors[0].location.is_some());

        assert!(!validate("<a>").unwrap().valid);
        assert!(!validate("").unwrap().valid);
    }
}
