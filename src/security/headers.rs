//! Header sanitization for forwarded requests and relayed responses.
//!
//! # Responsibilities
//! - Strip headers describing the local client (`sec-*`, `host`, `origin`)
//! - Strip framing headers the outbound transport recomputes
//! - Pin the outbound user-agent to the application's fallback identity
//! - Drop `content-encoding` from relayed responses (body arrives decoded)

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Request headers that never reach the upstream.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "origin",
    "content-length",
    // The session advertises only the encodings it decodes.
    "accept-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Response headers that never reach the inbound client.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-encoding",
    "connection",
    "keep-alive",
    "transfer-encoding",
];

fn is_sec_header(name: &HeaderName) -> bool {
    // HeaderName is always lowercase.
    name.as_str().starts_with("sec-")
}

/// Build the outbound header set from the inbound one.
pub fn sanitize_request_headers(inbound: &HeaderMap, user_agent: &HeaderValue) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_sec_header(name) || STRIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    outbound.insert(header::USER_AGENT, user_agent.clone());
    outbound
}

/// Build the header set relayed back to the inbound client.
pub fn relay_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}
