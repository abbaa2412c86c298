//! Request ID middleware for request tracing and correlation.
//!
//! Uses the upstream proxy's `x-request-id` when it is a reasonable token,
//! otherwise generates a UUID v4. The ID is recorded in the tracing span, set
//! as a Sentry tag and echoed in the response, so a buyer quoting it to
//! support can be matched to the order pipeline logs.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Accept an upstream request ID only if it is short and printable.
fn usable_request_id(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'))
    .then_some(value)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(usable_request_id)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_request_id() {
        assert_eq!(usable_request_id("abc-123_x.y"), Some("abc-123_x.y"));
        assert_eq!(usable_request_id(" 7f3a "), Some("7f3a"));
        assert_eq!(usable_request_id(""), None);
        assert_eq!(usable_request_id("has space"), None);
        assert_eq!(usable_request_id("<script>"), None);
        assert_eq!(usable_request_id(&"a".repeat(129)), None);
    }
}
