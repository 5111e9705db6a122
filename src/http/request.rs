//! Outbound request construction.
//!
//! # Responsibilities
//! - Copy the method verbatim
//! - Apply the header policy (see `security::headers`)
//! - Stream the inbound body through without buffering
//!
//! # Design Decisions
//! - A body that is already at end-of-stream is sent as no body at all, so
//!   bodiless requests are not re-framed as chunked uploads
//! - The inbound request is consumed; nothing is kept for retries

use axum::body::{Body, HttpBody};
use axum::http::Request;
use url::Url;

use crate::http::error::ForwardError;
use crate::security::sanitize_request_headers;
use crate::session::ProxySession;

/// Build the request sent upstream on behalf of `inbound`.
pub fn build_outbound_request(
    session: &ProxySession,
    inbound: Request<Body>,
    url: Url,
) -> Result<reqwest::Request, ForwardError> {
    let (parts, body) = inbound.into_parts();
    let headers = sanitize_request_headers(&parts.headers, session.user_agent());

    let mut outbound = session
        .client()
        .request(parts.method, url)
        .headers(headers);
    if !body.is_end_stream() {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    Ok(outbound.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Method};

    fn session() -> ProxySession {
        ProxySession::builder("test")
            .user_agent("fallback-agent/1.0")
            .build()
            .unwrap()
    }

    #[test]
    fn copies_method_and_url() {
        let inbound = Request::builder()
            .method(Method::DELETE)
            .uri("/proxy/poe.ninja/api/x?y=1")
            .body(Body::empty())
            .unwrap();
        let url = Url::parse("https://poe.ninja/api/x?y=1").unwrap();

        let outbound = build_outbound_request(&session(), inbound, url.clone()).unwrap();
        assert_eq!(outbound.method(), &Method::DELETE);
        assert_eq!(outbound.url(), &url);
        assert!(outbound.body().is_none());
    }

    #[test]
    fn applies_header_policy() {
        let inbound = Request::builder()
            .uri("/proxy/poe.ninja/api/data")
            .header("sec-fetch-mode", "navigate")
            .header(header::HOST, "local")
            .header(header::CONTENT_LENGTH, "0")
            .header(header::USER_AGENT, "curl/8.0")
            .header(header::ACCEPT, "*/*")
            .body(Body::empty())
            .unwrap();
        let url = Url::parse("https://poe.ninja/api/data").unwrap();

        let outbound = build_outbound_request(&session(), inbound, url).unwrap();
        let headers = outbound.headers();
        assert!(!headers.contains_key("sec-fetch-mode"));
        assert!(!headers.contains_key(header::HOST));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert_eq!(headers[header::USER_AGENT], "fallback-agent/1.0");
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn non_empty_body_is_streamed() {
        let inbound = Request::builder()
            .method(Method::POST)
            .uri("/proxy/poe.ninja/api/data")
            .body(Body::from("{\"query\":1}"))
            .unwrap();
        let url = Url::parse("https://poe.ninja/api/data").unwrap();

        let outbound = build_outbound_request(&session(), inbound, url).unwrap();
        let body = outbound.body().unwrap();
        // Streamed bodies expose no in-memory bytes.
        assert!(body.as_bytes().is_none());
    }
}
