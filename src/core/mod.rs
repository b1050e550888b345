pub mod engine;
pub mod envelope;
pub mod registry;

pub use engine::TransformEngine;
pub use envelope::{Envelope, EnvelopeStatus};
pub use registry::{Registry, Route};
