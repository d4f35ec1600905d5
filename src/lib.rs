//! Caching HTTP reverse proxy library.
//!
//! Serves request paths from a disk cache and forwards misses to a single
//! upstream origin, persisting each fetched body for later hits.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod upstream;

pub use config::ProxyConfig;
pub use http::{CacheProxy, RunningProxy};
pub use lifecycle::Shutdown;
