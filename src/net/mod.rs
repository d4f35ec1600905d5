//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listen prefix ("host:port" or "http://host:port/")
//!     → listener.rs (bind, accept loop, connection limits)
//!     → connection.rs (lifecycle tracking for drain on stop)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so shutdown can drain in-flight requests

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker};
pub use listener::{ListenPrefix, Listener, ListenerError, PrefixError};
