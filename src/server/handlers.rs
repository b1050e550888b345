use super::response::{converted, error_response, keyed, render};
use super::AppState;
use crate::adapters::storage::consume_upload;
use crate::domain::model::{
    Format, FormatOptions, OperationKind, Payload, StructuredValue, TransformRequest,
};
use crate::utils::error::TransformError;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

pub(super) async fn health() -> Response {
    Json(json!({ "status": "Backend is working" })).into_response()
}

pub(super) async fn convert(
    State(state): State<Arc<AppState>>,
    AxumPath(pair): AxumPath<String>,
    body: Bytes,
) -> Response {
    let (source, target) = match parse_pair(&pair) {
        Ok(pair) => pair,
        Err(err) => return error_response(err),
    };
    let fields = match BodyFields::parse(&body, convert_field(source, target)) {
        Ok(fields) => fields,
        Err(err) => return error_response(err),
    };

    let mut request = TransformRequest::convert(source, target, fields.payload);
    request.options = fields.options;

    let envelope = state.engine.clone().execute_blocking(request).await;
    render(envelope, |success| converted(target, success))
}

pub(super) async fn convert_csv_upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let text = match read_upload(&state, multipart, "csvFile", "CSV file").await {
        Ok(text) => text,
        Err(err) => return error_response(err),
    };

    let request = TransformRequest::convert(Format::Csv, Format::Json, Payload::Text(text));
    let envelope = state.engine.clone().execute_blocking(request).await;
    render(envelope, |success| keyed("data", success))
}

pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let text = match read_upload(&state, multipart, "file", "File").await {
        Ok(text) => text,
        Err(err) => return error_response(err),
    };

    let envelope = state
        .engine
        .clone()
        .execute_blocking(TransformRequest::format(Format::Json, text))
        .await;
    render(envelope, |success| keyed("formattedCode", success))
}

pub(super) async fn format(
    State(state): State<Arc<AppState>>,
    AxumPath(format): AxumPath<String>,
    body: Bytes,
) -> Response {
    per_format(state, OperationKind::Format, &format, &body).await
}

pub(super) async fn validate(
    State(state): State<Arc<AppState>>,
    AxumPath(format): AxumPath<String>,
    body: Bytes,
) -> Response {
    per_format(state, OperationKind::Validate, &format, &body).await
}

pub(super) async fn transform(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: TransformRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(TransformError::from(err)),
    };

    let envelope = state.engine.clone().execute_blocking(request).await;
    let status =
        StatusCode::from_u16(envelope.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

async fn per_format(
    state: Arc<AppState>,
    operation: OperationKind,
    format: &str,
    body: &[u8],
) -> Response {
    let format = match format.parse::<Format>() {
        Ok(format) => format,
        Err(_) => {
            return error_response(TransformError::UnsupportedOperation {
                operation: operation.to_string(),
                format: format!("unknown format '{format}'"),
            })
        }
    };
    let fields = match BodyFields::parse(body, format.name()) {
        Ok(fields) => fields,
        Err(err) => return error_response(err),
    };

    let request = TransformRequest {
        operation,
        source: format,
        target: None,
        payload: fields.payload,
        options: fields.options,
    };
    let envelope = state.engine.clone().execute_blocking(request).await;
    render(envelope, |success| keyed(format.name(), success))
}

/// `xml-to-json` style path segment.
fn parse_pair(pair: &str) -> Result<(Format, Format), TransformError> {
    let unsupported = || TransformError::UnsupportedOperation {
        operation: OperationKind::Convert.to_string(),
        format: format!("'{pair}'"),
    };

    let (source, target) = pair.split_once("-to-").ok_or_else(unsupported)?;
    let source = source.parse::<Format>().map_err(|_| unsupported())?;
    let target = target.parse::<Format>().map_err(|_| unsupported())?;
    Ok((source, target))
}

/// Body field carrying the payload of a conversion.
fn convert_field(source: Format, target: Format) -> &'static str {
    match (source, target) {
        (Format::Json, Format::Csv) => "jsonData",
        _ => source.name(),
    }
}

/// Payload field plus optional `options` of a JSON request body.
#[derive(Debug)]
struct BodyFields {
    payload: Payload,
    options: Option<FormatOptions>,
}

impl BodyFields {
    /// An empty body or a missing field yields an empty payload, which the
    /// engine reports as missing input.
    fn parse(body: &[u8], field: &str) -> Result<Self, TransformError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self {
                payload: Payload::Value(StructuredValue::Null),
                options: None,
            });
        }

        let value: serde_json::Value = serde_json::from_slice(body)?;
        let serde_json::Value::Object(mut object) = value else {
            return Err(TransformError::parse("Request body must be a JSON object"));
        };

        let payload = object
            .remove(field)
            .map(|value| Payload::from(StructuredValue::from(value)))
            .unwrap_or(Payload::Value(StructuredValue::Null));
        let options = object
            .remove("options")
            .map(serde_json::from_value::<FormatOptions>)
            .transpose()?;

        Ok(Self { payload, options })
    }
}

/// Pulls the named file part out of a multipart body and runs it through
/// the upload store.
async fn read_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    field_name: &str,
    what: &str,
) -> Result<String, TransformError> {
    let mut multipart = multipart
        .map_err(|e| TransformError::parse(format!("Expected a multipart upload: {e}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TransformError::parse(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let original_name = field.file_name().unwrap_or(field_name).to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| TransformError::parse(format!("Could not read uploaded file: {e}")))?;
        tracing::debug!("Received upload '{}' ({} bytes)", original_name, data.len());

        return consume_upload(state.uploads.as_ref(), &original_name, &data).await;
    }

    Err(TransformError::empty(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("xml-to-json").unwrap(), (Format::Xml, Format::Json));
        assert_eq!(parse_pair("json-to-csv").unwrap(), (Format::Json, Format::Csv));
        assert!(matches!(
            parse_pair("yaml-to-json"),
            Err(TransformError::UnsupportedOperation { .. })
        ));
        assert!(parse_pair("xml2json").is_err());
    }

    #[test]
    fn test_convert_field_names() {
        assert_eq!(convert_field(Format::Xml, Format::Json), "xml");
        assert_eq!(convert_field(Format::Json, Format::Xml), "json");
        assert_eq!(convert_field(Format::Json, Format::Csv), "jsonData");
    }

    #[test]
    fn test_body_fields() {
        let fields =
            BodyFields::parse(br#"{"css": "a{}", "options": {"indent_size": 2}}"#, "css").unwrap();
        assert_eq!(fields.payload, Payload::Text("a{}".into()));
        assert_eq!(fields.options, Some(FormatOptions::with_indent(2)));

        let fields = BodyFields::parse(br#"{"other": 1}"#, "css").unwrap();
        assert!(fields.payload.is_empty());

        let fields = BodyFields::parse(b"", "css").unwrap();
        assert!(fields.payload.is_empty());
    }

    #[test]
    fn test_body_fields_rejects_bad_json() {
        let err = BodyFields::parse(b"{\"css\": ", "css").unwrap_err();
        assert!(matches!(err, TransformError::ParseError { .. }));

        let err = BodyFields::parse(b"[1]", "css").unwrap_err();
        assert!(matches!(err, TransformError::ParseError { .. }));
    }
}
