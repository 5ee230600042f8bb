//! # docket-inference
//!
//! Inference backend for image→structured-data extraction.
//!
//! The backend is an opaque remote procedure: it takes an encoded image plus
//! extraction options and returns a raw text blob claimed to contain JSON.
//! Output quality is unpredictable; cleanup and parse live in
//! [`output`] and failure classification in the task handler.

pub mod backend;
pub mod mock;
pub mod output;
pub mod prompt;

pub use backend::{ChatCompletionsBackend, InferenceBackend, InferenceConfig};
pub use mock::MockBackend;
pub use output::{parse_extraction, strip_code_fences};
