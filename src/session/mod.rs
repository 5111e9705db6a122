//! Outbound session shared by every forwarded request.
//!
//! # Responsibilities
//! - Own the cookie jar and connection pool for proxy traffic
//! - Keep proxy traffic isolated from any other outbound client in the host
//! - Run optional extensions once, against the handle forwards will use
//!
//! # Design Decisions
//! - One instance per process, passed by handle rather than held globally
//! - Cloning is cheap; all clones share the same jar and pool
//! - Concurrency is delegated to `reqwest` (pool) and its `Jar` (RwLock inside)
//! - No eviction: cookies live as long as the process, subject to upstream expiry

pub mod extension;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;

pub use extension::SessionExtension;

/// Error raised while building a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user agent is not a valid header value")]
    InvalidUserAgent,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("extension '{name}' failed to attach: {source}")]
    Extension {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

struct SessionInner {
    partition: String,
    client: reqwest::Client,
    jar: Arc<Jar>,
    user_agent: HeaderValue,
    scheme: &'static str,
}

/// Handle to the process-wide outbound session.
#[derive(Clone)]
pub struct ProxySession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for ProxySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySession")
            .field("partition", &self.inner.partition)
            .field("scheme", &self.inner.scheme)
            .finish_non_exhaustive()
    }
}

impl ProxySession {
    pub fn builder(partition: impl Into<String>) -> ProxySessionBuilder {
        ProxySessionBuilder::new(partition)
    }

    pub fn partition(&self) -> &str {
        &self.inner.partition
    }

    /// User-agent every forwarded request carries.
    pub fn user_agent(&self) -> &HeaderValue {
        &self.inner.user_agent
    }

    /// Scheme used to reach upstreams (`https` outside of tests).
    pub fn scheme(&self) -> &'static str {
        self.inner.scheme
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Cookies the jar would send to `url`, as a `Cookie` header value.
    pub fn cookies_for(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.jar.cookies(url)
    }

    /// Whether two handles refer to the same underlying session.
    pub fn same_session(&self, other: &ProxySession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder for [`ProxySession`].
pub struct ProxySessionBuilder {
    partition: String,
    user_agent: String,
    scheme: &'static str,
    connect_timeout: Duration,
    resolve: Vec<(String, SocketAddr)>,
    extensions: Vec<Box<dyn SessionExtension>>,
}

impl ProxySessionBuilder {
    fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            user_agent: crate::config::schema::DEFAULT_USER_AGENT.to_string(),
            scheme: "https",
            connect_timeout: Duration::from_secs(5),
            resolve: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Pin `host` to `addr`, bypassing DNS.
    pub fn resolve(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
        self.resolve.push((host.into(), addr));
        self
    }

    /// Reach upstreams over plain HTTP. Only meaningful for local test upstreams.
    pub fn plaintext_upstreams(mut self) -> Self {
        self.scheme = "http";
        self
    }

    /// Register an extension to attach once the session exists.
    pub fn extension(mut self, extension: impl SessionExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn build(self) -> Result<ProxySession, SessionError> {
        let user_agent =
            HeaderValue::from_str(&self.user_agent).map_err(|_| SessionError::InvalidUserAgent)?;
        let jar = Arc::new(Jar::default());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .zstd(true);

        // Pinned addresses must not be routed through an environment proxy.
        if !self.resolve.is_empty() {
            builder = builder.no_proxy();
        }
        for (host, addr) in &self.resolve {
            builder = builder.resolve(host, *addr);
        }

        let session = ProxySession {
            inner: Arc::new(SessionInner {
                partition: self.partition,
                client: builder.build()?,
                jar,
                user_agent,
                scheme: self.scheme,
            }),
        };

        for extension in &self.extensions {
            extension
                .attach(&session)
                .map_err(|source| SessionError::Extension {
                    name: extension.name().to_string(),
                    source,
                })?;
            tracing::info!(
                partition = %session.partition(),
                extension = extension.name(),
                "Session extension attached"
            );
        }

        tracing::debug!(
            partition = %session.partition(),
            scheme = session.scheme(),
            pinned_hosts = self.resolve.len(),
            "Proxy session created"
        );
        Ok(session)
    }
}
