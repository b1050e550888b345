use crate::utils::error::{ErrorKind, TransformError};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recursive tree shared by every adapter that converts between data formats.
///
/// Mappings keep insertion order so keys come back out in the order they were
/// written, which the CSV field order and XML element order depend on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<StructuredValue>),
    Mapping(IndexMap<String, StructuredValue>),
}

impl StructuredValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StructuredValue::Null)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            StructuredValue::Sequence(_) | StructuredValue::Mapping(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StructuredValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, StructuredValue>> {
        match self {
            StructuredValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[StructuredValue]> {
        match self {
            StructuredValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StructuredValue::Null => "null",
            StructuredValue::Bool(_) => "boolean",
            StructuredValue::Number(_) => "number",
            StructuredValue::String(_) => "string",
            StructuredValue::Sequence(_) => "array",
            StructuredValue::Mapping(_) => "object",
        }
    }
}

impl From<serde_json::Value> for StructuredValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => StructuredValue::Null,
            serde_json::Value::Bool(b) => StructuredValue::Bool(b),
            serde_json::Value::Number(n) => StructuredValue::Number(n),
            serde_json::Value::String(s) => StructuredValue::String(s),
            serde_json::Value::Array(items) => {
                StructuredValue::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => StructuredValue::Mapping(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl From<StructuredValue> for serde_json::Value {
    fn from(value: StructuredValue) -> Self {
        match value {
            StructuredValue::Null => serde_json::Value::Null,
            StructuredValue::Bool(b) => serde_json::Value::Bool(b),
            StructuredValue::Number(n) => serde_json::Value::Number(n),
            StructuredValue::String(s) => serde_json::Value::String(s),
            StructuredValue::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(Self::from).collect())
            }
            StructuredValue::Mapping(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for StructuredValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// One row of delimited text; field order follows the header line.
pub type TabularRecord = IndexMap<String, StructuredValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Convert,
    Format,
    Validate,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Convert => "convert",
            OperationKind::Format => "format",
            OperationKind::Validate => "validate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
    Html,
    Css,
    #[serde(alias = "js")]
    JavaScript,
    Csv,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Json,
        Format::Xml,
        Format::Html,
        Format::Css,
        Format::JavaScript,
        Format::Csv,
    ];

    /// Lowercase name, also used as the request/response field name on the
    /// per-format routes.
    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Html => "html",
            Format::Css => "css",
            Format::JavaScript => "javascript",
            Format::Csv => "csv",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Xml => "XML",
            Format::Html => "HTML",
            Format::Css => "CSS",
            Format::JavaScript => "JavaScript",
            Format::Csv => "CSV",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Format {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            "html" => Ok(Format::Html),
            "css" => Ok(Format::Css),
            "javascript" | "js" => Ok(Format::JavaScript),
            "csv" => Ok(Format::Csv),
            other => Err(TransformError::UnsupportedOperation {
                operation: "any".to_string(),
                format: format!("unknown format '{other}'"),
            }),
        }
    }
}

/// Printing options; every formatter honors `indent_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub indent_size: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { indent_size: 4 }
    }
}

impl FormatOptions {
    pub fn with_indent(indent_size: usize) -> Self {
        Self { indent_size }
    }

    pub fn indent_unit(&self) -> String {
        " ".repeat(self.indent_size)
    }
}

/// Request payload: raw text, or an already-structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Value(StructuredValue),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(text) => text.trim().is_empty(),
            Payload::Value(value) => value.is_null(),
        }
    }
}

impl From<StructuredValue> for Payload {
    fn from(value: StructuredValue) -> Self {
        match value {
            StructuredValue::String(text) => Payload::Text(text),
            other => Payload::Value(other),
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StructuredValue::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransformRequest {
    pub operation: OperationKind,
    pub source: Format,
    #[serde(default)]
    pub target: Option<Format>,
    pub payload: Payload,
    #[serde(default)]
    pub options: Option<FormatOptions>,
}

impl TransformRequest {
    pub fn convert(source: Format, target: Format, payload: Payload) -> Self {
        Self {
            operation: OperationKind::Convert,
            source,
            target: Some(target),
            payload,
            options: None,
        }
    }

    pub fn format(format: Format, text: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Format,
            source: format,
            target: None,
            payload: Payload::Text(text.into()),
            options: None,
        }
    }

    pub fn validate(format: Format, text: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Validate,
            source: format,
            target: None,
            payload: Payload::Text(text.into()),
            options: None,
        }
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// 1-based position inside the submitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Computes the line/column of a byte offset into `text`.
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(error: Diagnostic) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    /// Valid iff `errors` is empty.
    pub fn from_diagnostics(errors: Vec<Diagnostic>, warnings: Vec<Diagnostic>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    Text,
    StructuredValue,
}

/// Data produced by a convert or format adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Text(String),
    Value(StructuredValue),
}

impl Output {
    pub fn kind(&self) -> OutputKind {
        match self {
            Output::Text(_) => OutputKind::Text,
            Output::Value(_) => OutputKind::StructuredValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Success {
    pub kind: OutputKind,
    pub data: Output,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Success {
    pub fn new(data: Output) -> Self {
        Self {
            kind: data.kind(),
            data,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error_kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransformResult {
    Success(Success),
    Verdict(ValidationVerdict),
    Failure(Failure),
}
