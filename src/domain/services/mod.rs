pub mod sanitizer;
pub mod tabular;

pub use sanitizer::sanitize_keys;
pub use tabular::{from_delimited_text, to_delimited_text};
