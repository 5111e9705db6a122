//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 connection)
//!     → intercept.rs (/proxy/ hook: allowlist, forward)
//!         → request.rs (outbound request, sanitized headers, streamed body)
//!         → session (shared cookie jar + pool)
//!         → response.rs (status, relayed headers, streamed body under deadline)
//!     → routes.rs (everything the hook passes: health, config store)
//! ```

pub mod error;
pub mod intercept;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use error::ForwardError;
pub use intercept::{Intercept, SelectiveProxy};
pub use server::HttpServer;
