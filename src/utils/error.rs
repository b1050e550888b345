use crate::domain::model::Location;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ParseError,
    UnsupportedOperation,
    EmptyInput,
    InvalidSyntax,
    InternalFault,
}

impl ErrorKind {
    /// Client-caused failures are reported back verbatim, everything else is
    /// hidden behind a generic message.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::InternalFault)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::EmptyInput => "EmptyInput",
            ErrorKind::InvalidSyntax => "InvalidSyntax",
            ErrorKind::InternalFault => "InternalFault",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{message}{}", location_suffix(.location))]
    ParseError {
        message: String,
        location: Option<Location>,
    },

    #[error("Operation '{operation}' is not supported for {format}")]
    UnsupportedOperation { operation: String, format: String },

    #[error("{what} is required")]
    EmptyInput { what: String },

    #[error("Invalid syntax: {message}")]
    InvalidSyntax { message: String },

    #[error("Internal fault: {message}")]
    InternalFault { message: String },
}

fn location_suffix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(" (line {}, column {})", loc.line, loc.column),
        None => String::new(),
    }
}

impl TransformError {
    pub fn parse(message: impl Into<String>) -> Self {
        TransformError::ParseError {
            message: message.into(),
            location: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, location: Location) -> Self {
        TransformError::ParseError {
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn empty(what: impl Into<String>) -> Self {
        TransformError::EmptyInput { what: what.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TransformError::InternalFault {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransformError::ParseError { .. } => ErrorKind::ParseError,
            TransformError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            TransformError::EmptyInput { .. } => ErrorKind::EmptyInput,
            TransformError::InvalidSyntax { .. } => ErrorKind::InvalidSyntax,
            TransformError::InternalFault { .. } => ErrorKind::InternalFault,
        }
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        let location = (err.line() > 0).then(|| Location::new(err.line(), err.column()));
        // serde_json appends " at line X column Y" to its Display output
        let message = err.to_string();
        let message = match message.rfind(" at line ") {
            Some(idx) if location.is_some() => message[..idx].to_string(),
            _ => message,
        };
        TransformError::ParseError { message, location }
    }
}

/// Errors raised outside the transform engine: bootstrap, configuration and
/// upload staging.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Adapter registration failed: {message}")]
    RegistryError { message: String },

    #[error("Upload error: {message}")]
    UploadError { message: String },
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_keeps_location_out_of_message() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let converted = TransformError::from(err);

        match &converted {
            TransformError::ParseError { message, location } => {
                assert!(!message.contains(" at line "));
                assert_eq!(location.map(|l| l.line), Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(converted.to_string().contains("(line 1, column"));
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(TransformError::empty("XML data").kind(), ErrorKind::EmptyInput);
        assert_eq!(
            TransformError::internal("boom").kind(),
            ErrorKind::InternalFault
        );
        assert!(ErrorKind::ParseError.is_client_error());
        assert!(!ErrorKind::InternalFault.is_client_error());
    }

    #[test]
    fn test_empty_input_message() {
        assert_eq!(
            TransformError::empty("XML data").to_string(),
            "XML data is required"
        );
    }
}
