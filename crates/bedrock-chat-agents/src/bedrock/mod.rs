//! Minimal signed HTTP client for the Bedrock runtime and agent-runtime APIs.

pub mod client;
pub mod error;
pub mod event_stream;

pub use client::BedrockClient;
pub use event_stream::{EventMessage, EventStreamDecoder, HeaderValue};
