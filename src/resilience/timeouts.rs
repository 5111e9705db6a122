//! Forward deadline and per-request state machine.
//!
//! # Responsibilities
//! - Arm one deadline when the outbound request is dispatched
//! - Track the exchange through its states until a terminal one
//! - Disarm the deadline on every terminal transition
//!
//! # States
//! ```text
//! Dispatched → HeadersReceived → Relaying → Completed
//!      │              │              │
//!      └──────────────┴──────────────┴──→ Aborted (deadline, client gone)
//!                                     └──→ Errored (transport failure)
//! ```
//!
//! # Design Decisions
//! - Uses Tokio's timer; dropping the `Sleep` is the cancellation
//! - The deadline covers headers and body together
//! - An exchange dropped before reaching a terminal state counts as aborted
//! - The connection task also watches the deadline through a
//!   [`DeadlineWatch`]; hyper stops polling the body while the client is not
//!   reading, so the in-band timer alone cannot end a stalled relay

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::Sleep;
use uuid::Uuid;

use crate::http::error::ForwardError;
use crate::observability::metrics;

/// Default deadline from dispatch to completed relay.
pub const FORWARD_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Where a forwarded request is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    Dispatched,
    HeadersReceived,
    Relaying,
    Completed,
    Aborted,
    Errored,
}

impl ForwardState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Errored)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::HeadersReceived => "headers_received",
            Self::Relaying => "relaying",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Errored => "errored",
        }
    }
}

/// Deadline of the forward in flight on one inbound connection.
///
/// The exchange arms it at dispatch and disarms it on its terminal
/// transition. The connection task waits on [`DeadlineWatch::overrun`] next
/// to the HTTP state machine and drops the connection when it resolves.
#[derive(Debug, Clone)]
pub struct DeadlineWatch {
    tx: Arc<watch::Sender<Option<tokio::time::Instant>>>,
}

impl DeadlineWatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_armed(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn arm(&self, at: tokio::time::Instant) {
        self.tx.send_replace(Some(at));
    }

    fn disarm(&self) {
        self.tx.send_replace(None);
    }

    /// Resolves once an armed deadline passes without being disarmed.
    pub async fn overrun(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let armed = *rx.borrow_and_update();
            let changed = match armed {
                Some(at) => tokio::select! {
                    () = tokio::time::sleep_until(at) => return,
                    changed = rx.changed() => changed,
                },
                None => rx.changed().await,
            };
            // Unreachable while `self` holds the sender.
            if changed.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for DeadlineWatch {
    fn default() -> Self {
        Self::new()
    }
}

/// One forwarded request, from dispatch to its terminal state.
#[derive(Debug)]
pub struct ForwardExchange {
    id: Uuid,
    host: String,
    state: ForwardState,
    timeout: Duration,
    deadline: tokio::time::Instant,
    timer: Option<Pin<Box<Sleep>>>,
    watch: Option<DeadlineWatch>,
    started: Instant,
}

impl ForwardExchange {
    /// Enter `Dispatched` and arm the deadline.
    pub fn dispatch(host: impl Into<String>, timeout: Duration) -> Self {
        let deadline = tokio::time::Instant::now() + timeout;
        let exchange = Self {
            id: Uuid::new_v4(),
            host: host.into(),
            state: ForwardState::Dispatched,
            timeout,
            deadline,
            timer: Some(Box::pin(tokio::time::sleep_until(deadline))),
            watch: None,
            started: Instant::now(),
        };
        tracing::trace!(forward_id = %exchange.id, host = %exchange.host, "Forward dispatched");
        exchange
    }

    /// Publish the deadline to the connection serving this exchange.
    pub fn watched_by(mut self, watch: DeadlineWatch) -> Self {
        if !self.state.is_terminal() {
            watch.arm(self.deadline);
            self.watch = Some(watch);
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ForwardState {
        self.state
    }

    /// Whether the deadline can still fire.
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Move to a non-terminal state. Ignored once terminal.
    pub fn advance(&mut self, next: ForwardState) {
        debug_assert!(!next.is_terminal(), "use complete() or fail() for terminal states");
        if self.state.is_terminal() {
            return;
        }
        tracing::trace!(
            forward_id = %self.id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Forward state change"
        );
        self.state = next;
    }

    /// Resolves once the deadline passes. Pending forever when disarmed.
    pub fn poll_deadline(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match self.timer.as_mut() {
            Some(timer) => timer.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }

    pub async fn deadline(&mut self) {
        poll_fn(|cx| self.poll_deadline(cx)).await
    }

    /// The deadline error for this exchange.
    pub fn timeout_error(&self) -> ForwardError {
        ForwardError::Timeout {
            after: self.timeout,
        }
    }

    /// Enter `Completed`.
    pub fn complete(&mut self) {
        if !self.finish(ForwardState::Completed) {
            return;
        }
        tracing::debug!(
            forward_id = %self.id,
            host = %self.host,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Relay completed"
        );
    }

    /// Enter `Aborted` (deadline) or `Errored` (anything else) and log it.
    pub fn fail(&mut self, error: &ForwardError) {
        let terminal = match error {
            ForwardError::Timeout { .. } => ForwardState::Aborted,
            _ => ForwardState::Errored,
        };
        if !self.finish(terminal) {
            return;
        }
        tracing::error!(
            forward_id = %self.id,
            host = %self.host,
            error = %error,
            "error [cors-proxy] {} ({})",
            error,
            self.host
        );
    }

    /// Disarm the timer and record the terminal state.
    ///
    /// Returns `false` when the exchange had already terminated.
    fn finish(&mut self, terminal: ForwardState) -> bool {
        self.timer = None;
        if let Some(watch) = self.watch.take() {
            watch.disarm();
        }
        if self.state.is_terminal() {
            return false;
        }
        self.state = terminal;
        metrics::record_forward(&self.host, terminal.as_str(), self.started);
        true
    }
}

impl Drop for ForwardExchange {
    fn drop(&mut self) {
        // Dropped by the connection task after the deadline passed.
        if !self.state.is_terminal() && tokio::time::Instant::now() >= self.deadline {
            let err = self.timeout_error();
            self.fail(&err);
            return;
        }
        if self.finish(ForwardState::Aborted) {
            tracing::debug!(
                forward_id = %self.id,
                host = %self.host,
                "Client went away, upstream request dropped"
            );
        }
    }
}
