//! Conversions between formats. Each function takes the request payload as
//! submitted and produces either markup text or a structured value.

use crate::adapters::{json, xml};
use crate::domain::model::{FormatOptions, Output, Payload, StructuredValue, TabularRecord};
use crate::domain::services::{from_delimited_text, sanitize_keys, to_delimited_text};
use crate::utils::error::TransformError;

/// Advisory download name attached to CSV output.
pub const CSV_FILENAME: &str = "data.csv";

/// Returns the payload as a structured value, parsing text as JSON.
fn structured(payload: Payload) -> Result<StructuredValue, TransformError> {
    match payload {
        Payload::Text(text) => json::parse(&text),
        Payload::Value(value) => Ok(value),
    }
}

fn text(payload: Payload, what: &str) -> Result<String, TransformError> {
    match payload {
        Payload::Text(text) => Ok(text),
        Payload::Value(value) => Err(TransformError::parse(format!(
            "{what} input must be text, got {}",
            value.type_name()
        ))),
    }
}

pub fn xml_to_json(payload: Payload, _options: &FormatOptions) -> Result<Output, TransformError> {
    let text = text(payload, "XML")?;
    Ok(Output::Value(xml::parse(&text)?))
}

pub fn json_to_xml(payload: Payload, options: &FormatOptions) -> Result<Output, TransformError> {
    let value = sanitize_keys(structured(payload)?);
    Ok(Output::Text(xml::print(&value, options)?))
}

pub fn csv_to_json(payload: Payload, _options: &FormatOptions) -> Result<Output, TransformError> {
    let text = text(payload, "CSV")?;
    let records = from_delimited_text(&text)?;
    Ok(Output::Value(StructuredValue::Sequence(
        records.into_iter().map(StructuredValue::Mapping).collect(),
    )))
}

/// The payload must be a sequence of mappings; anything else is a parse
/// error rather than a codec fault.
pub fn json_to_csv(payload: Payload, _options: &FormatOptions) -> Result<Output, TransformError> {
    let records = match structured(payload)? {
        StructuredValue::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                StructuredValue::Mapping(record) => Ok(record),
                other => Err(TransformError::parse(format!(
                    "Record {} must be an object, got {}",
                    idx + 1,
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<TabularRecord>, _>>()?,
        other => {
            return Err(TransformError::parse(format!(
                "Expected an array of records, got {}",
                other.type_name()
            )))
        }
    };

    Ok(Output::Text(to_delimited_text(&records)?))
}
