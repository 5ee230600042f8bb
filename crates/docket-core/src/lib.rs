//! # docket-core
//!
//! Core types, traits, and abstractions for the docket extraction pipeline.
//!
//! This crate provides the foundational data structures, the error type, and
//! the default constants that the other docket crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::{
    bounded_excerpt, default_excerpt, Envelope, ErrorRecord, ResultRecord, ResultStatus,
    TaskRequest, TaskResponse,
};
