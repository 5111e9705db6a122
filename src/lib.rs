//! Selective reverse proxy for a local application host.
//!
//! Requests under `/proxy/<host>/...` are forwarded to a compiled-in set of
//! upstream hosts over HTTPS through one shared, cookie-keeping session.
//! Everything else is served by the host's normal routes.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod session;
pub mod store;

pub use config::AppConfig;
pub use http::{HttpServer, SelectiveProxy};
pub use lifecycle::Shutdown;
pub use session::ProxySession;
