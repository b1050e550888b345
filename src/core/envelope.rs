use crate::domain::model::{Failure, Success, TransformResult, ValidationVerdict};
use crate::utils::error::{ErrorKind, TransformError};
use serde::Serialize;

/// Message returned for every internal fault; the detail only goes to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeStatus {
    Ok,
    ClientError,
    ServerError,
}

impl EnvelopeStatus {
    pub fn http_code(self) -> u16 {
        match self {
            EnvelopeStatus::Ok => 200,
            EnvelopeStatus::ClientError => 400,
            EnvelopeStatus::ServerError => 500,
        }
    }
}

/// Uniform response for one transform request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub result: TransformResult,
}

impl Envelope {
    pub fn success(success: Success) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            result: TransformResult::Success(success),
        }
    }

    /// A verdict is a normal result even when it says the input is invalid.
    pub fn verdict(verdict: ValidationVerdict) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            result: TransformResult::Verdict(verdict),
        }
    }

    pub fn failure(error: TransformError) -> Self {
        let kind = error.kind();
        if kind.is_client_error() {
            return Self::client_failure(kind, error.to_string());
        }

        tracing::error!("Transform failed with an internal fault: {}", error);
        Self {
            status: EnvelopeStatus::ServerError,
            result: TransformResult::Failure(Failure {
                error_kind: kind,
                message: INTERNAL_ERROR_MESSAGE.to_string(),
            }),
        }
    }

    fn client_failure(kind: ErrorKind, message: String) -> Self {
        Self {
            status: EnvelopeStatus::ClientError,
            result: TransformResult::Failure(Failure {
                error_kind: kind,
                message,
            }),
        }
    }

    pub fn from_outcome(outcome: Result<TransformResult, TransformError>) -> Self {
        match outcome {
            Ok(TransformResult::Success(success)) => Self::success(success),
            Ok(TransformResult::Verdict(verdict)) => Self::verdict(verdict),
            Ok(TransformResult::Failure(failure)) if failure.error_kind.is_client_error() => {
                Self::client_failure(failure.error_kind, failure.message)
            }
            Ok(TransformResult::Failure(failure)) => {
                Self::failure(TransformError::internal(failure.message))
            }
            Err(error) => Self::failure(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == EnvelopeStatus::Ok
    }

    pub fn http_code(&self) -> u16 {
        self.status.http_code()
    }
}
