pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServiceConfig;

pub use crate::core::{Envelope, EnvelopeStatus, Registry, Route, TransformEngine};
pub use domain::model::{Format, FormatOptions, OperationKind, Payload, TransformRequest};
pub use utils::error::{ErrorKind, Result, ServiceError, TransformError};
