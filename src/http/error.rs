//! Errors raised while forwarding a request.
//!
//! None of these become an HTTP response. Returned from the connection
//! service they make hyper drop the socket; yielded from a relayed body they
//! cut the response short.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Host segment is not on the allowlist.
    #[error("host '{host}' is not allowed")]
    Forbidden { host: String },

    /// Marker matched but no usable upstream URL could be built.
    #[error("invalid upstream target '{target}'")]
    InvalidTarget { target: String },

    #[error("request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error(transparent)]
    Upstream(#[from] reqwest::Error),
}

impl ForwardError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
