use crate::adapters::convert::CSV_FILENAME;
use crate::core::envelope::Envelope;
use crate::core::registry::Registry;
use crate::domain::model::{
    Format, FormatOptions, OperationKind, Output, Payload, Success, TransformRequest,
    TransformResult,
};
use crate::domain::ports::Adapter;
use crate::utils::error::{Result, TransformError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub const MIN_INDENT_SIZE: usize = 1;
pub const MAX_INDENT_SIZE: usize = 16;

/// Dispatches one request to its adapter and wraps the outcome. Holds no
/// per-request state, so one instance is shared by every handler.
#[derive(Debug)]
pub struct TransformEngine {
    registry: Registry,
    defaults: FormatOptions,
}

impl TransformEngine {
    pub fn new(registry: Registry, defaults: FormatOptions) -> Self {
        Self { registry, defaults }
    }

    /// Engine over the built-in routes.
    pub fn builtin(defaults: FormatOptions) -> Result<Self> {
        Ok(Self::new(Registry::builtin()?, defaults))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn defaults(&self) -> FormatOptions {
        self.defaults
    }

    pub fn execute(&self, request: TransformRequest) -> Envelope {
        Envelope::from_outcome(self.run(request))
    }

    /// Runs [`execute`](Self::execute) on the blocking pool.
    pub async fn execute_blocking(self: Arc<Self>, request: TransformRequest) -> Envelope {
        match tokio::task::spawn_blocking(move || self.execute(request)).await {
            Ok(envelope) => envelope,
            Err(e) => Envelope::failure(TransformError::internal(format!(
                "transform task failed: {e}"
            ))),
        }
    }

    fn run(&self, request: TransformRequest) -> std::result::Result<TransformResult, TransformError> {
        let TransformRequest {
            operation,
            source,
            target,
            payload,
            options,
        } = request;

        let adapter = self.registry.resolve(operation, source, target)?;
        tracing::debug!(
            "Resolved {} {}{} to {:?}",
            operation,
            source.name(),
            target.map(|t| format!(" -> {}", t.name())).unwrap_or_default(),
            adapter
        );

        // empty input is a verdict for validation, an error everywhere else
        if operation != OperationKind::Validate && payload.is_empty() {
            return Err(TransformError::empty(format!("{} data", source.label())));
        }

        let options = options.unwrap_or(self.defaults);
        if !(MIN_INDENT_SIZE..=MAX_INDENT_SIZE).contains(&options.indent_size) {
            return Err(TransformError::parse(format!(
                "indent_size must be between {MIN_INDENT_SIZE} and {MAX_INDENT_SIZE}, got {}",
                options.indent_size
            )));
        }

        panic::catch_unwind(AssertUnwindSafe(|| {
            invoke(adapter, source, target, payload, &options)
        }))
        .unwrap_or_else(|panic| Err(TransformError::internal(panic_message(panic))))
    }
}

fn invoke(
    adapter: Adapter,
    source: Format,
    target: Option<Format>,
    payload: Payload,
    options: &FormatOptions,
) -> std::result::Result<TransformResult, TransformError> {
    match adapter {
        Adapter::Convert(convert) => {
            let mut success = Success::new(convert(payload, options)?);
            if target == Some(Format::Csv) {
                success = success.with_filename(CSV_FILENAME);
            }
            Ok(TransformResult::Success(success))
        }
        Adapter::Format(format) => {
            let text = payload_text(payload, source)?;
            let formatted = format(&text, options)?;
            Ok(TransformResult::Success(Success::new(Output::Text(formatted))))
        }
        Adapter::Validate(validate) => {
            let text = payload_text(payload, source)?;
            Ok(TransformResult::Verdict(validate(&text)?))
        }
    }
}

/// Text view of the payload. Only JSON accepts an already-structured value,
/// which is serialized back to compact text.
fn payload_text(payload: Payload, source: Format) -> std::result::Result<String, TransformError> {
    match payload {
        Payload::Text(text) => Ok(text),
        Payload::Value(value) if source == Format::Json => serde_json::to_string(&value)
            .map_err(|e| TransformError::internal(format!("JSON serialization failed: {e}"))),
        Payload::Value(value) => Err(TransformError::parse(format!(
            "{} input must be text, got {}",
            source.label(),
            value.type_name()
        ))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("adapter panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("adapter panicked: {message}")
    } else {
        "adapter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::{EnvelopeStatus, INTERNAL_ERROR_MESSAGE};
    use crate::core::registry::Route;
    use crate::domain::model::{StructuredValue, ValidationVerdict};
    use crate::utils::error::ErrorKind;
    use serde_json::json;

    fn engine() -> TransformEngine {
        TransformEngine::builtin(FormatOptions::default()).unwrap()
    }

    fn failure_kind(envelope: &Envelope) -> ErrorKind {
        match &envelope.result {
            TransformResult::Failure(failure) => failure.error_kind,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_format_json_uses_default_indent() {
        let envelope = engine().execute(TransformRequest::format(Format::Json, "{\"a\":1}"));
        assert!(envelope.is_ok());
        assert_eq!(
            envelope.result,
            TransformResult::Success(Success::new(Output::Text("{\n    \"a\": 1\n}".into())))
        );
    }

    #[test]
    fn test_request_options_override_defaults() {
        let request = TransformRequest::format(Format::Json, "[1]")
            .with_options(FormatOptions::with_indent(2));
        let envelope = engine().execute(request);
        assert_eq!(
            envelope.result,
            TransformResult::Success(Success::new(Output::Text("[\n  1\n]".into())))
        );
    }

    #[test]
    fn test_indent_out_of_range_is_client_error() {
        let request = TransformRequest::format(Format::Css, "a{}")
            .with_options(FormatOptions::with_indent(0));
        let envelope = engine().execute(request);
        assert_eq!(envelope.status, EnvelopeStatus::ClientError);
        assert_eq!(failure_kind(&envelope), ErrorKind::ParseError);
    }

    #[test]
    fn test_empty_payload_rejected_except_validate() {
        let engine = engine();

        let envelope = engine.execute(TransformRequest::format(Format::Xml, "  "));
        assert_eq!(failure_kind(&envelope), ErrorKind::EmptyInput);

        let envelope = engine.execute(TransformRequest::convert(
            Format::Json,
            Format::Xml,
            Payload::Value(StructuredValue::Null),
        ));
        assert_eq!(failure_kind(&envelope), ErrorKind::EmptyInput);

        let envelope = engine.execute(TransformRequest::validate(Format::Json, ""));
        assert!(envelope.is_ok());
        assert!(matches!(
            envelope.result,
            TransformResult::Verdict(ValidationVerdict { valid: false, .. })
        ));
    }

    #[test]
    fn test_unsupported_pair() {
        let envelope = engine().execute(TransformRequest::validate(Format::JavaScript, "x"));
        assert_eq!(envelope.status, EnvelopeStatus::ClientError);
        assert_eq!(failure_kind(&envelope), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_json_to_csv_carries_filename() {
        let envelope = engine().execute(TransformRequest::convert(
            Format::Json,
            Format::Csv,
            Payload::Value(json!([{"a": 1}]).into()),
        ));
        match envelope.result {
            TransformResult::Success(success) => {
                assert_eq!(success.filename.as_deref(), Some("data.csv"));
                assert_eq!(success.data, Output::Text("a\n1".into()));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_format_accepts_structured_json() {
        let request = TransformRequest {
            operation: OperationKind::Format,
            source: Format::Json,
            target: None,
            payload: Payload::Value(json!({"b": [true]}).into()),
            options: Some(FormatOptions::with_indent(1)),
        };
        let envelope = engine().execute(request);
        assert_eq!(
            envelope.result,
            TransformResult::Success(Success::new(Output::Text(
                "{\n \"b\": [\n  true\n ]\n}".into()
            )))
        );
    }

    fn exploding(_: &str, _: &FormatOptions) -> std::result::Result<String, TransformError> {
        panic!("adapter bug")
    }

    #[test]
    fn test_adapter_panic_becomes_internal_fault() {
        let mut registry = Registry::new();
        registry
            .register(Route::format(Format::Css), Adapter::Format(exploding))
            .unwrap();
        let engine = TransformEngine::new(registry, FormatOptions::default());

        let envelope = engine.execute(TransformRequest::format(Format::Css, "a {}"));
        assert_eq!(envelope.status, EnvelopeStatus::ServerError);
        match envelope.result {
            TransformResult::Failure(failure) => {
                assert_eq!(failure.error_kind, ErrorKind::InternalFault);
                assert_eq!(failure.message, INTERNAL_ERROR_MESSAGE);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_blocking() {
        let engine = Arc::new(engine());
        let envelope = engine
            .execute_blocking(TransformRequest::validate(Format::Html, "<p>hi</p>"))
            .await;
        assert_eq!(
            envelope.result,
            TransformResult::Verdict(ValidationVerdict::valid())
        );
    }
}
