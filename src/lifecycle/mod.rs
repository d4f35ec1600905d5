//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     stop() / signal → broadcast → accept loops exit → drain connections
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown of the binary
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Drain has a timeout; stragglers are left running, not cancelled

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
