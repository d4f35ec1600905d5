//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper connection, Axum middleware)
//!     → request.rs (request ID)
//!     → handler.rs (cache lookup, forward on miss, store)
//!     → response.rs (relay headers, CORS, error page)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::AppState;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{CacheProxy, ProxyError, RunningProxy};
