use crate::domain::model::{Location, StructuredValue, TabularRecord};
use crate::utils::error::TransformError;

/// Reads delimited text into records. The first line names the fields; every
/// following line maps onto them by position. Cells past the header are named
/// `field{N}` and short lines simply omit their trailing fields.
///
/// Values are kept as strings; callers that want numbers or booleans coerce
/// them themselves.
pub fn from_delimited_text(text: &str) -> Result<Vec<TabularRecord>, TransformError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let mut record = TabularRecord::with_capacity(row.len());
        for (idx, cell) in row.iter().enumerate() {
            let name = headers
                .get(idx)
                .map(str::to_string)
                .unwrap_or_else(|| format!("field{}", idx + 1));
            record.insert(name, StructuredValue::String(cell.to_string()));
        }
        records.push(record);
    }

    tracing::debug!(
        "Decoded {} records with {} fields",
        records.len(),
        headers.len()
    );
    Ok(records)
}

/// Writes records as comma-separated text. Field order comes from the first
/// record; strings are always quoted, numbers and booleans keep their literal
/// form, nulls and missing fields become empty cells.
pub fn to_delimited_text(records: &[TabularRecord]) -> Result<String, TransformError> {
    let first = records
        .first()
        .ok_or_else(|| TransformError::empty("At least one record"))?;
    if first.is_empty() {
        return Err(TransformError::empty("At least one field"));
    }

    let fields: Vec<&String> = first.keys().collect();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        fields
            .iter()
            .map(|name| quote_if_needed(name))
            .collect::<Vec<_>>()
            .join(","),
    );

    for record in records {
        let cells: Vec<String> = fields
            .iter()
            .map(|name| {
                record
                    .get(*name)
                    .map(encode_cell)
                    .unwrap_or_else(|| Ok(String::new()))
            })
            .collect::<Result<_, _>>()?;
        lines.push(cells.join(","));
    }

    Ok(lines.join("\n"))
}

fn encode_cell(value: &StructuredValue) -> Result<String, TransformError> {
    Ok(match value {
        StructuredValue::Null => String::new(),
        StructuredValue::Bool(b) => b.to_string(),
        StructuredValue::Number(n) => n.to_string(),
        StructuredValue::String(s) => quote(s),
        nested => {
            let json = serde_json::to_string(nested)
                .map_err(|e| TransformError::internal(format!("nested cell encoding: {e}")))?;
            quote(&json)
        }
    })
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn quote_if_needed(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quote(value)
    } else {
        value.to_string()
    }
}

fn csv_error(err: csv::Error) -> TransformError {
    let location = err
        .position()
        .map(|pos| Location::new(pos.line() as usize, 1));
    let message = match err.kind() {
        csv::ErrorKind::Utf8 { .. } => "CSV input is not valid UTF-8".to_string(),
        _ => format!("Invalid CSV: {err}"),
    };
    TransformError::ParseError { message, location }
}
