use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::body::CountingBody;
use super::observer::{TrafficObserver, Transaction};

/// Tower-compatible middleware that feeds every exchange into the traffic
/// observer:
///
///   request observed:  before the handler runs, with the estimated size
///   bytes written:     per body frame, via `CountingBody`
///   response observed: once, when the body finishes or is dropped
///
/// The response itself is passed through untouched. Push channels are not
/// tracked: a session lasting minutes would swamp the response-time window.
pub async fn track_traffic(
    State(observer): State<Arc<dyn TrafficObserver>>,
    req: Request,
    next: Next,
) -> Response {
    if is_push_channel(req.uri().path()) {
        return next.run(req).await;
    }

    let size = request_size(req.method(), req.uri(), req.headers());
    let mut txn = Transaction::begin(
        observer,
        req.method().clone(),
        req.uri().path(),
        size,
    );

    // If this future is dropped here (client gone), `txn` completes on drop
    let response = next.run(req).await;
    txn.set_status(response.status());

    response.map(|body| Body::new(CountingBody::new(body, txn)))
}

/// Long-lived snapshot feeds (`/ws` and the SSE stream).
pub fn is_push_channel(path: &str) -> bool {
    path == "/ws" || path.ends_with("/stream")
}

/// Approximate wire size of a request: a synthesized HTTP/1.1 request line,
/// every `name: value\r\n` header line, the blank line, and the body length
/// declared by `Content-Length` (zero when missing or unparseable).
pub fn request_size(method: &Method, uri: &Uri, headers: &HeaderMap) -> u64 {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());

    // "{method} {target} HTTP/1.1\r\n"
    let request_line = method.as_str().len() + 1 + target.len() + 1 + "HTTP/1.1\r\n".len();

    let header_lines: usize = headers
        .iter()
        .map(|(name, value)| name.as_str().len() + 2 + value.as_bytes().len() + 2)
        .sum();

    let declared_body = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    // Content-Length is client-controlled and may be close to u64::MAX
    ((request_line + header_lines + 2) as u64).saturating_add(declared_body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn request_line_and_headers() {
        let uri: Uri = "/api/test".parse().unwrap();
        // 24 (request line) + 17 ("host: localhost\r\n") + 2
        let size = request_size(&Method::GET, &uri, &headers(&[("host", "localhost")]));
        assert_eq!(size, 43);
    }

    #[test]
    fn query_string_counts_toward_request_line() {
        let uri: Uri = "/api/test?a=1".parse().unwrap();
        assert_eq!(request_size(&Method::GET, &uri, &HeaderMap::new()), 24 + 4 + 2);
    }

    #[test]
    fn declared_body_length_is_added() {
        let uri: Uri = "/api/test".parse().unwrap();
        // 24 + 19 ("content-length: 5\r\n") + 2 + 5
        let size = request_size(&Method::GET, &uri, &headers(&[("content-length", "5")]));
        assert_eq!(size, 50);
    }

    #[test]
    fn invalid_content_length_counts_as_zero() {
        let uri: Uri = "/api/test".parse().unwrap();
        // 24 + 21 ("content-length: abc\r\n") + 2
        let size = request_size(&Method::GET, &uri, &headers(&[("content-length", "abc")]));
        assert_eq!(size, 47);

        let negative = request_size(&Method::GET, &uri, &headers(&[("content-length", "-3")]));
        assert_eq!(negative, 46);
    }

    #[test]
    fn push_channels_are_recognised() {
        assert!(is_push_channel("/ws"));
        assert!(is_push_channel("/api/metrics/stream"));
        assert!(!is_push_channel("/api/metrics"));
        assert!(!is_push_channel("/stats"));
        assert!(!is_push_channel("/ws/extra"));
    }

    #[test]
    fn huge_content_length_saturates() {
        let uri: Uri = "/api/test".parse().unwrap();
        let size = request_size(
            &Method::POST,
            &uri,
            &headers(&[("content-length", "18446744073709551613")]),
        );
        assert_eq!(size, u64::MAX);
    }

    #[test]
    fn repeated_headers_are_each_counted() {
        let uri: Uri = "/".parse().unwrap();
        let size = request_size(
            &Method::POST,
            &uri,
            &headers(&[("accept", "a"), ("accept", "b")]),
        );
        // "POST / HTTP/1.1\r\n" = 17, "accept: a\r\n" = 11 twice, + 2
        assert_eq!(size, 17 + 22 + 2);
    }
}
