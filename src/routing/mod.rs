//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path + query)
//!     → matcher.rs (does the path carry the /proxy/ marker?)
//!     → allowlist.rs (is the host segment permitted?)
//!     → Return: ProxyTarget + AllowlistEntry, or rejection
//! ```
//!
//! # Design Decisions
//! - Allowlist compiled in, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same decision

pub mod allowlist;
pub mod matcher;

pub use allowlist::{Allowlist, AllowlistEntry};
pub use matcher::{ProxyTarget, PROXY_MARKER};
