//! Startup hooks bound to the proxy session.

use super::ProxySession;

/// Something that binds itself to the proxy session once, at startup.
///
/// Extensions receive the same handle every forward uses, so anything they
/// register (cookies, request policies) is visible to proxied traffic.
pub trait SessionExtension: Send + Sync {
    fn name(&self) -> &str;

    fn attach(&self, session: &ProxySession)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
