//! Upstream API access.
//!
//! The HTTP transport is a seam (`Transport`) so the engine can run against
//! libcurl in production and scripted responses in tests. Everything above
//! the transport speaks the JSON envelope `{success, data}` /
//! `{success, error, detail}` and converts it into typed results.

mod client;
mod credential;
mod curl;
mod envelope;
mod error;
mod transport;

pub use client::{ControlOp, QueueApi};
pub use credential::Credential;
pub use curl::CurlTransport;
pub use envelope::{decode_ack, decode_items, decode_link};
pub use error::{ApiError, TransportError};
pub use transport::{ApiRequest, ApiResponse, Method, Transport};
