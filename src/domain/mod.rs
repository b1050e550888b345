// Domain layer: request/response model, ports, and the pure services (key
// sanitizer, tabular codec) the adapters build on.

pub mod model;
pub mod ports;

pub mod services;
