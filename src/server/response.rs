use crate::core::Envelope;
use crate::domain::model::{Format, Output, Success, TransformResult};
use crate::utils::error::TransformError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Turns an envelope into a response. `on_success` renders the route's own
/// success body; verdicts and failures have one shape everywhere.
pub(super) fn render(envelope: Envelope, on_success: impl FnOnce(Success) -> Response) -> Response {
    let status = StatusCode::from_u16(envelope.http_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match envelope.result {
        TransformResult::Success(success) => on_success(success),
        TransformResult::Verdict(verdict) => (status, Json(verdict)).into_response(),
        TransformResult::Failure(failure) => (
            status,
            Json(json!({ "error": failure.message, "kind": failure.error_kind })),
        )
            .into_response(),
    }
}

pub(super) fn error_response(error: TransformError) -> Response {
    render(Envelope::failure(error), |success| Json(success).into_response())
}

/// `{"<key>": data}` for text and structured output alike.
pub(super) fn keyed(key: &str, success: Success) -> Response {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), output_json(success.data));
    Json(serde_json::Value::Object(body)).into_response()
}

/// Converted documents go back raw with the target's media type; structured
/// results are keyed by the target's name.
pub(super) fn converted(target: Format, success: Success) -> Response {
    let text = match success.data {
        Output::Text(text) => text,
        Output::Value(_) => return keyed(target.name(), success),
    };

    let mut response = (StatusCode::OK, text).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(media_type(target)));
    if let Some(filename) = success.filename {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={filename}")) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

fn media_type(format: Format) -> &'static str {
    match format {
        Format::Json => "application/json",
        Format::Xml => "application/xml",
        Format::Html => "text/html; charset=utf-8",
        Format::Css => "text/css; charset=utf-8",
        Format::JavaScript => "text/javascript; charset=utf-8",
        Format::Csv => "text/csv",
    }
}

fn output_json(output: Output) -> serde_json::Value {
    match output {
        Output::Text(text) => serde_json::Value::String(text),
        Output::Value(value) => value.into(),
    }
}
