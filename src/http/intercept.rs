//! The `/proxy/` interception hook.
//!
//! Runs ahead of normal request handling for every inbound request:
//!
//! ```text
//! path without /proxy/     → Intercept::Pass (request untouched)
//! host not on allowlist    → Err(Forbidden)  (socket dropped, no upstream call)
//! host allowed             → validate → sanitize → forward → relay
//! ```

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tracing::Instrument;

use crate::http::error::ForwardError;
use crate::http::request::build_outbound_request;
use crate::http::response::relay_response;
use crate::observability::metrics;
use crate::resilience::{DeadlineWatch, ForwardExchange, FORWARD_TIMEOUT};
use crate::routing::{Allowlist, ProxyTarget};
use crate::session::ProxySession;

/// Outcome of running the hook on one request.
pub enum Intercept {
    /// Not a proxy request; hand it to the normal handlers.
    Pass(Request<Body>),
    /// Forwarded; relay this response.
    Relay(Response<Body>),
}

/// Gate, sanitize, forward and relay requests carrying the proxy marker.
#[derive(Debug, Clone)]
pub struct SelectiveProxy {
    allowlist: Allowlist,
    session: ProxySession,
    timeout: Duration,
}

impl SelectiveProxy {
    pub fn new(session: ProxySession) -> Self {
        Self {
            allowlist: Allowlist::builtin(),
            session,
            timeout: FORWARD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &ProxySession {
        &self.session
    }

    /// Run the hook. `Err` means the inbound connection must be dropped.
    pub async fn intercept(&self, request: Request<Body>) -> Result<Intercept, ForwardError> {
        let Some(target) = ProxyTarget::parse(request.uri()) else {
            return Ok(Intercept::Pass(request));
        };

        if self.allowlist.lookup(target.host()).is_none() {
            tracing::warn!(host = %target.host(), "Rejected proxy request for unlisted host");
            metrics::record_rejection();
            return Err(ForwardError::Forbidden {
                host: target.host().to_string(),
            });
        }

        let span = tracing::info_span!(
            "forward",
            method = %request.method(),
            host = %target.host(),
            forward_id = tracing::field::Empty,
        );
        self.forward(target, request)
            .instrument(span)
            .await
            .map(Intercept::Relay)
    }

    async fn forward(
        &self,
        target: ProxyTarget,
        request: Request<Body>,
    ) -> Result<Response<Body>, ForwardError> {
        tracing::info!("request {} ({})", request.uri(), target.host());

        let Some(url) = target.url(self.session.scheme()) else {
            let err = ForwardError::InvalidTarget {
                target: target.upstream().to_string(),
            };
            tracing::warn!(host = %target.host(), error = %err, "Refusing to forward");
            return Err(err);
        };
        // Present when a connection task serves the request.
        let watch = request.extensions().get::<DeadlineWatch>().cloned();
        let outbound = build_outbound_request(&self.session, request, url)?;

        let mut exchange = ForwardExchange::dispatch(target.host(), self.timeout);
        if let Some(watch) = watch {
            exchange = exchange.watched_by(watch);
        }
        tracing::Span::current().record("forward_id", tracing::field::display(exchange.id()));
        tracing::debug!(url = %outbound.url(), "Forwarding");

        let result = tokio::select! {
            result = self.session.client().execute(outbound) => result.map_err(ForwardError::from),
            () = exchange.deadline() => Err(ForwardError::Timeout { after: self.timeout }),
        };

        match result {
            Ok(upstream) => Ok(relay_response(upstream, exchange)),
            Err(err) => {
                exchange.fail(&err);
                Err(err)
            }
        }
    }
}
