//! # docket-broker
//!
//! AMQP (RabbitMQ) connection lifecycle and publishing for the docket
//! pipeline.
//!
//! This crate provides:
//! - [`BrokerConnection`] — owns one connection/channel pair, declares the
//!   durable queues, reconnects with a fixed backoff, and broadcasts a
//!   shutdown signal when a live connection is observed lost
//! - [`Publisher`] — durable publishing to named queues with a single
//!   reconnect attempt on an unhealthy connection
//! - [`QueuePublisher`] — the seam the task handler publishes through, with
//!   [`RecordingPublisher`] for deterministic tests

pub mod connection;
pub mod publisher;

pub use connection::{BrokerConfig, BrokerConnection};
pub use publisher::{Publisher, QueuePublisher, RecordingPublisher};
