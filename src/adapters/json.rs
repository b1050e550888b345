use crate::domain::model::{Diagnostic, FormatOptions, StructuredValue, ValidationVerdict};
use crate::utils::error::TransformError;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Strict JSON parse: no comments, no trailing commas. Key order is kept.
pub fn parse(text: &str) -> Result<StructuredValue, TransformError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(value.into())
}

pub fn print(value: &StructuredValue, options: &FormatOptions) -> Result<String, TransformError> {
    let indent = options.indent_unit();
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    value
        .serialize(&mut serializer)
        .map_err(|e| TransformError::internal(format!("JSON serialization failed: {e}")))?;
    String::from_utf8(out).map_err(|e| TransformError::internal(e.to_string()))
}

pub fn format(text: &str, options: &FormatOptions) -> Result<String, TransformError> {
    print(&parse(text)?, options)
}

pub fn validate(text: &str) -> Result<ValidationVerdict, TransformError> {
    match parse(text) {
        Ok(_) => Ok(ValidationVerdict::valid()),
        Err(TransformError::ParseError { message, location }) => {
            Ok(ValidationVerdict::invalid(Diagnostic { message, location }))
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uses_indent_option() {
        let formatted = format(r#"{"a":[1,2],"b":{}}"#, &FormatOptions::with_indent(2)).unwrap();
        assert_eq!(formatted, "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}");
    }

    #[test]
    fn test_format_default_indent_and_order() {
        let formatted = format(r#"{"z":1,"a":2}"#, &FormatOptions::default()).unwrap();
        assert_eq!(formatted, "{\n    \"z\": 1,\n    \"a\": 2\n}");
    }

    #[test]
    fn test_number_literals_survive() {
        assert!(validate("1e400").unwrap().valid);
        assert!(validate("[-0.0, 12345678901234567890123]").unwrap().valid);

        let formatted = format(r#"{"big":12345678901234567890123,"tiny":1e-400}"#, &FormatOptions::with_indent(1))
            .unwrap();
        assert_eq!(formatted, "{\n \"big\": 12345678901234567890123,\n \"tiny\": 1e-400\n}");
    }

    #[test]
    fn test_format_is_idempotent() {
        let options = FormatOptions::default();
        let once = format(r#"[ {"k": "v", "n": [true, null, 1.5]} ]"#, &options).unwrap();
        assert_eq!(format(&once, &options).unwrap(), once);
    }

    #[test]
    fn test_print_parse_round_trip() {
        let source = r#"{"name":"Ada","tags":["math",{"deep":[1,2,3]}],"n":null}"#;
        let value = parse(source).unwrap();
        let printed = print(&value, &FormatOptions::default()).unwrap();
        assert_eq!(parse(&printed).unwrap(), value);
    }

    #[test]
    fn test_validate_reports_error_with_location() {
        let verdict = validate("{").unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.errors.len(), 1);
        assert!(!verdict.errors[0].message.is_empty());
        assert!(verdict.errors[0].location.is_some());
    }

    #[test]
    fn test_validate_strict_grammar() {
        assert!(validate("{}").unwrap().valid);
        assert!(!validate("{\"a\": 1,}").unwrap().valid);
        assert!(!validate("// comment\n{}").unwrap().valid);
        assert!(!validate("").unwrap().valid);
    }
}
