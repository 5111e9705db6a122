//! Response relay.
//!
//! # Responsibilities
//! - Copy status code and reason phrase from the upstream response
//! - Apply the response header policy (see `security::headers`)
//! - Stream the upstream body chunk by chunk under the forward deadline
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Upstream failures end the body with an error; hyper then resets the
//!   client connection instead of finishing the message
//! - Dropping the body (client gone) drops the upstream response with it

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Response;
use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use hyper::ext::ReasonPhrase;

use crate::http::error::ForwardError;
use crate::resilience::{ForwardExchange, ForwardState};
use crate::security::relay_response_headers;

/// Upstream body relayed under the exchange's deadline.
pub struct RelayBody {
    upstream: BoxStream<'static, Result<Bytes, ForwardError>>,
    exchange: ForwardExchange,
}

impl RelayBody {
    pub fn new<S, E>(upstream: S, mut exchange: ForwardExchange) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ForwardError>,
    {
        exchange.advance(ForwardState::Relaying);
        Self {
            upstream: upstream.map(|chunk| chunk.map_err(Into::into)).boxed(),
            exchange,
        }
    }

    pub fn state(&self) -> ForwardState {
        self.exchange.state()
    }
}

impl Stream for RelayBody {
    type Item = Result<Bytes, ForwardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exchange.state().is_terminal() {
            return Poll::Ready(None);
        }

        // Deadline first: a chatty upstream must not starve the timer.
        if this.exchange.poll_deadline(cx).is_ready() {
            let err = this.exchange.timeout_error();
            this.exchange.fail(&err);
            return Poll::Ready(Some(Err(err)));
        }

        match this.upstream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(err))) => {
                this.exchange.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.exchange.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Turn the upstream response into the one written to the inbound client.
pub fn relay_response(upstream: reqwest::Response, mut exchange: ForwardExchange) -> Response<Body> {
    exchange.advance(ForwardState::HeadersReceived);

    let status = upstream.status();
    let headers = relay_response_headers(upstream.headers());
    let reason = upstream.extensions().get::<ReasonPhrase>().cloned();

    let body = RelayBody::new(upstream.bytes_stream(), exchange);
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(reason) = reason {
        response.extensions_mut().insert(reason);
    }
    response
}
