//! # docket-worker
//!
//! The worker half of the docket pipeline: a single pull-based consumer loop
//! that takes extraction requests off the durable request queue, runs them
//! through the inference backend, and writes the outcome to the result store
//! and the response/error queues.
//!
//! One worker process runs one [`ConsumerLoop`]; horizontal throughput comes
//! from running more worker processes against the same durable queue
//! (competing consumers), not from intra-process parallelism.

pub mod consumer;
pub mod handler;

pub use consumer::{classify, Classification, ConsumerLoop, StopHandle};
pub use handler::TaskHandler;
