//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → key.rs (flatten path into a file name)
//!     → store.rs (read / atomic write under the cache root)
//! ```
//!
//! # Design Decisions
//! - Only the body is persisted; no status, headers or timestamps
//! - No expiry or eviction: entries live until removed out-of-band
//! - Writes are temp-file + rename under a per-key lock

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::CacheStore;
