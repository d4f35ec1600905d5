//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! inbound method, path, query, headers
//!     → headers.rs (strip Host, Content-Length, hop-by-hop)
//!     → forwarder.rs (pooled hyper client, deadline, full body buffer)
//!     → UpstreamResponse { status, headers, body }
//! ```
//!
//! # Design Decisions
//! - One fixed origin; path and query appended verbatim
//! - Whole body buffered before the caller sees the response
//! - Failures are returned, never retried

pub mod forwarder;
pub mod headers;

pub use forwarder::{ForwardError, Forwarder, UpstreamResponse};
