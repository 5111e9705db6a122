//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve HTTP/1.1 on each connection with hyper
//! - Run the proxy hook ahead of the normal router
//! - Drop a connection whose forward overran its deadline
//! - Drain connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::http::error::ForwardError;
use crate::http::intercept::{Intercept, SelectiveProxy};
use crate::http::routes::build_router;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener};
use crate::resilience::DeadlineWatch;
use crate::session::{ProxySession, SessionError};
use crate::store::ConfigStore;

/// The embedding HTTP server: proxy hook plus normal routes.
pub struct HttpServer {
    proxy: SelectiveProxy,
    router: Router,
    store: Arc<ConfigStore>,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server with a fresh session built from the configuration.
    pub fn new(config: AppConfig) -> Result<Self, SessionError> {
        let session = ProxySession::builder(config.proxy.partition.clone())
            .user_agent(config.proxy.user_agent.clone())
            .build()?;
        Ok(Self::with_session(config, session))
    }

    /// Create a server around an existing session.
    pub fn with_session(config: AppConfig, session: ProxySession) -> Self {
        let proxy = SelectiveProxy::new(session)
            .with_timeout(Duration::from_millis(config.proxy.timeout_ms));
        let store = Arc::new(ConfigStore::new(config.store.resolve_path()));
        let router = build_router(Arc::clone(&store));

        tracing::info!(
            partition = %proxy.session().partition(),
            timeout_ms = config.proxy.timeout_ms,
            store = %store.path().display(),
            "HTTP server configured"
        );

        Self {
            proxy,
            router,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn session(&self) -> &ProxySession {
        self.proxy.session()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let tracker = ConnectionTracker::new();
        let (stop_tx, stop_rx) = watch::channel(false);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
                        tokio::spawn(
                            serve_connection(
                                stream,
                                peer,
                                self.proxy.clone(),
                                self.router.clone(),
                                stop_rx.clone(),
                                permit,
                                guard,
                            )
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        let limit = Duration::from_secs(self.config.listener.drain_timeout_secs);
        if !tracker.drain(limit).await {
            tracing::warn!(
                open_connections = tracker.active_count(),
                "Drain timeout reached, abandoning connections"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    proxy: SelectiveProxy,
    router: Router,
    mut stop: watch::Receiver<bool>,
    _permit: ConnectionPermit,
    _guard: ConnectionGuard,
) {
    let deadline = DeadlineWatch::new();
    let service = {
        let deadline = deadline.clone();
        service_fn(move |request: Request<Incoming>| {
            dispatch(proxy.clone(), router.clone(), deadline.clone(), request)
        })
    };

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    // An overrun drops `conn`, and with it the relay and the upstream response.
    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = deadline.overrun() => {
            tracing::debug!(peer = %peer, "Forward deadline passed, dropping connection");
            return;
        }
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            tokio::select! {
                result = conn.as_mut() => result,
                () = deadline.overrun() => return,
            }
        }
    };

    // Dropped connections (rejections, relay failures, client resets) land here.
    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
    }
}

/// Proxy hook first; anything it passes goes to the normal router.
async fn dispatch(
    proxy: SelectiveProxy,
    router: Router,
    deadline: DeadlineWatch,
    request: Request<Incoming>,
) -> Result<Response<Body>, ForwardError> {
    let mut request = request.map(Body::new);
    request.extensions_mut().insert(deadline);
    match proxy.intercept(request).await? {
        Intercept::Relay(response) => Ok(response),
        Intercept::Pass(request) => match router.oneshot(request).await {
            Ok(response) => Ok(response),
            Err(never) => match never {},
        },
    }
}
