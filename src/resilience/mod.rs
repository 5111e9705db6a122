//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarded request:
//!     → timeouts.rs (arm deadline at dispatch)
//!     → headers arrive → body relayed chunk by chunk
//!     → terminal state (completed / aborted / errored) disarms the deadline
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every forward has a deadline
//! - No retries: a failed forward is reported, the client decides what next

pub mod timeouts;

pub use timeouts::{DeadlineWatch, ForwardExchange, ForwardState, FORWARD_TIMEOUT};
