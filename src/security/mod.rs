//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Allowlisted request:
//!     → headers.rs (drop client context, pin user-agent)
//!     → forwarded upstream
//! Upstream response:
//!     → headers.rs (drop content-encoding and framing headers)
//!     → relayed to client
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown hosts never reach this stage
//! - No trust in client input; the upstream never sees who the client is

pub mod headers;

pub use headers::{relay_response_headers, sanitize_request_headers};
