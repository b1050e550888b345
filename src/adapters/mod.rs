// Adapters layer: one module per text format plus the upload storage backend.
// Each format module exposes plain functions (`parse`, `print`, `format`,
// `validate`) that the registry wires up as typed adapter entries.

pub mod convert;
pub mod css;
pub mod html;
pub mod javascript;
pub mod json;
pub mod storage;
pub mod text;
pub mod xml;
