//! Extraction pipeline for the status page's embedded state.
//!
//! markup -> sanitize -> engine (relaxed parser, decoder, schema check)

pub mod decode;
pub mod engine;
pub mod markup;
pub mod relaxed;
pub mod sanitize;
pub mod schema;

pub use decode::decode;
pub use engine::{extract, ExtractionError};
pub use markup::find_preload_script;
pub use sanitize::sanitize;
pub use schema::{is_valid, SchemaViolation};
