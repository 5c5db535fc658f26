//! Output rendering for analysis results.

mod json;

pub use json::{to_json, JsonFormat};
