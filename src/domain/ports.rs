use crate::domain::model::{FormatOptions, OperationKind, Output, Payload, ValidationVerdict};
use crate::utils::error::{Result, TransformError};
use async_trait::async_trait;
use std::path::PathBuf;

pub type ConvertFn = fn(Payload, &FormatOptions) -> std::result::Result<Output, TransformError>;
pub type FormatFn = fn(&str, &FormatOptions) -> std::result::Result<String, TransformError>;
pub type ValidateFn = fn(&str) -> std::result::Result<ValidationVerdict, TransformError>;

/// A typed adapter entry point. The variant fixes which operation kind the
/// function may be registered under.
#[derive(Clone, Copy)]
pub enum Adapter {
    Convert(ConvertFn),
    Format(FormatFn),
    Validate(ValidateFn),
}

impl Adapter {
    pub fn kind(&self) -> OperationKind {
        match self {
            Adapter::Convert(_) => OperationKind::Convert,
            Adapter::Format(_) => OperationKind::Format,
            Adapter::Validate(_) => OperationKind::Validate,
        }
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Adapter::{}", self.kind())
    }
}

/// Handle to an upload that has been written to temporary storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_name: String,
}

/// Temporary storage for uploaded files. Every staged file must be discarded
/// exactly once by the caller.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn stage(&self, original_name: &str, data: &[u8]) -> Result<StagedFile>;
    async fn read(&self, file: &StagedFile) -> Result<Vec<u8>>;
    async fn discard(&self, file: StagedFile) -> Result<()>;
}
