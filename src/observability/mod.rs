//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handler and subsystems produce:
//!     → logging.rs (structured tracing events, request ID in fields)
//!     → metrics.rs (counters and histograms per outcome)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
