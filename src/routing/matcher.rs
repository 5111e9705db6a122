//! Proxy marker matching.
//!
//! # Responsibilities
//! - Recognise paths of the form `/proxy/<host>/<rest>`
//! - Extract the target host (first segment after the marker)
//! - Build the upstream URL from everything after the marker
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - The host is not normalised; the allowlist compares it verbatim
//! - No regex to guarantee O(n) matching

use axum::http::Uri;
use url::Url;

/// Path prefix that marks a request for forwarding.
pub const PROXY_MARKER: &str = "/proxy/";

/// A request path that carries the proxy marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    host: String,
    upstream: String,
}

impl ProxyTarget {
    /// Returns `None` when the path does not start with the marker.
    pub fn parse(uri: &Uri) -> Option<Self> {
        let path_and_query = uri.path_and_query()?.as_str();
        let upstream = path_and_query.strip_prefix(PROXY_MARKER)?;
        // Only `/` ends the segment; a query glued to the host stays part of it.
        let host = upstream.split('/').next().unwrap_or_default();

        Some(Self {
            host: host.to_string(),
            upstream: upstream.to_string(),
        })
    }

    /// Host component exactly as it appeared in the path.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Everything after the marker: host, further segments, query.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Absolute upstream URL under `scheme`.
    ///
    /// Returns `None` when the result does not parse or its host differs from
    /// the segment that was checked against the allowlist.
    pub fn url(&self, scheme: &str) -> Option<Url> {
        let url = Url::parse(&format!("{}://{}", scheme, self.upstream)).ok()?;
        (url.host_str() == Some(self.host.as_str())).then_some(url)
    }
}
